use indicatif::ProgressBar;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tag_core::{are_tags_similar_with, SimilarityPolicy, Tag};

#[derive(Debug, Clone)]
pub struct ClusterMember {
    pub tag: Tag,
    pub items: usize,
}

/// Tags connected by pairwise similarity. `members[0]` is the proposed
/// merge target.
#[derive(Debug, Clone)]
pub struct TagCluster {
    pub members: Vec<ClusterMember>,
}

impl TagCluster {
    pub fn target(&self) -> &ClusterMember {
        &self.members[0]
    }

    pub fn sources(&self) -> impl Iterator<Item = &ClusterMember> {
        self.members.iter().skip(1)
    }
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            Ordering::Less => self.parent[ra] = rb,
            Ordering::Greater => self.parent[rb] = ra,
            Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Index pairs `(i, j)`, `i < j`, of similar tag names.
pub fn similar_pairs(
    tags: &[Tag],
    policy: &SimilarityPolicy,
    progress: &ProgressBar,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize)> = (0..tags.len())
        .into_par_iter()
        .flat_map_iter(|i| {
            let found: Vec<(usize, usize)> = (i + 1..tags.len())
                .filter(|&j| are_tags_similar_with(policy, &tags[i].name, &tags[j].name))
                .map(|j| (i, j))
                .collect();
            progress.inc(1);
            found
        })
        .collect();
    pairs.sort_unstable();
    pairs
}

// Most used first, then oldest, then smallest id.
fn preference(a: &ClusterMember, b: &ClusterMember) -> Ordering {
    b.items
        .cmp(&a.items)
        .then_with(|| a.tag.created_at.cmp(&b.tag.created_at))
        .then_with(|| a.tag.id.cmp(&b.tag.id))
}

/// Groups tags into connected components of the similarity relation.
///
/// Similarity is not transitive, so a component may join two tags that are
/// not similar to each other through a third one; the report exists so an
/// operator can check that before merging.
pub fn cluster_tags(
    tags: &[Tag],
    usage: &HashMap<String, usize>,
    policy: &SimilarityPolicy,
    progress: &ProgressBar,
) -> Vec<TagCluster> {
    let mut sets = DisjointSet::new(tags.len());
    for (i, j) in similar_pairs(tags, policy, progress) {
        sets.union(i, j);
    }

    let mut groups: BTreeMap<usize, Vec<ClusterMember>> = BTreeMap::new();
    for (index, tag) in tags.iter().enumerate() {
        let root = sets.find(index);
        groups.entry(root).or_default().push(ClusterMember {
            tag: tag.clone(),
            items: usage.get(&tag.id).copied().unwrap_or(0),
        });
    }

    let mut clusters: Vec<TagCluster> = groups
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|mut members| {
            members.sort_by(preference);
            TagCluster { members }
        })
        .collect();
    clusters.sort_by(|a, b| a.target().tag.name.cmp(&b.target().tag.name));
    clusters
}
