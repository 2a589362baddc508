use tag_core::{
    SqliteTagStore, Tag, TagError, TagKind, TagService, TagStore,
};
use tempfile::TempDir;

fn open(dir: &TempDir) -> TagService<SqliteTagStore> {
    let store = SqliteTagStore::open(&dir.path().join("tags.sqlite3")).unwrap();
    TagService::new(store)
}

fn seed(service: &mut TagService<SqliteTagStore>, tags: &[(&str, &str)], links: &[(&str, &str)]) {
    for (id, name) in tags {
        service
            .store_mut()
            .insert_tag(&Tag::new(*id, *name, TagKind::Manual))
            .unwrap();
    }
    for (item, tag) in links {
        service.store_mut().add_tag_to_item(item, tag).unwrap();
    }
}

fn item_tags(service: &TagService<SqliteTagStore>, item: &str) -> Vec<String> {
    service.store().tags_for_item(item).unwrap().into_iter().collect()
}

#[test]
fn merge_scenario_persists() {
    let dir = TempDir::new().unwrap();
    {
        let mut service = open(&dir);
        seed(
            &mut service,
            &[("t1", "portrait"), ("t2", "portraits"), ("t3", "portait")],
            &[("item1", "t1"), ("item2", "t2"), ("item3", "t3"), ("item1", "t2")],
        );
        let records = service.merge_tags("t1", &["t2", "t3"]).unwrap();
        assert_eq!(records.len(), 2);
    }

    let service = open(&dir);
    assert!(service.store().tag("t1").unwrap().is_some());
    assert!(service.store().tag("t2").unwrap().is_none());
    assert!(service.store().tag("t3").unwrap().is_none());
    for item in ["item1", "item2", "item3"] {
        assert_eq!(item_tags(&service, item), vec!["t1"]);
    }
    let history = service.merge_history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].source_tag_name, "portraits");
    let snapshot = history[0].snapshot.as_ref().unwrap();
    assert_eq!(snapshot.source_items, vec!["item1", "item2"]);
    assert_eq!(snapshot.target_items, vec!["item1"]);
}

#[test]
fn self_merge_leaves_database_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut service = open(&dir);
    seed(&mut service, &[("t1", "landscape")], &[("item1", "t1")]);
    service.merge_tags("t1", &["t1"]).unwrap();
    assert_eq!(service.store().tags().unwrap().len(), 1);
    assert!(service.merge_history().unwrap().is_empty());
}

#[test]
fn unknown_source_rolls_nothing_in() {
    let dir = TempDir::new().unwrap();
    let mut service = open(&dir);
    seed(&mut service, &[("t1", "portrait"), ("t2", "portraits")], &[("item2", "t2")]);
    let err = service.merge_tags("t1", &["t2", "ghost"]).unwrap_err();
    assert!(matches!(err, TagError::TagNotFound(id) if id == "ghost"));
    assert_eq!(item_tags(&service, "item2"), vec!["t2"]);
}

#[test]
fn aliases_survive_merge_and_undo() {
    let dir = TempDir::new().unwrap();
    let mut service = open(&dir);
    seed(
        &mut service,
        &[("t1", "black and white"), ("t2", "noir et blanc")],
        &[("item-A", "t2"), ("item-B", "t1")],
    );
    service.create_alias("B&W", "t2").unwrap();
    assert_eq!(service.get_tag_by_alias("b&w").unwrap().as_deref(), Some("t2"));

    let records = service.merge_tags("t1", &["t2"]).unwrap();
    assert_eq!(service.get_tag_by_alias("b&W").unwrap().as_deref(), Some("t1"));

    service.undo_merge(&records[0].id).unwrap();
    assert_eq!(service.get_tag_by_alias("b&w").unwrap().as_deref(), Some("t2"));
    assert_eq!(item_tags(&service, "item-A"), vec!["t2"]);
    assert_eq!(item_tags(&service, "item-B"), vec!["t1"]);
    assert!(service.undoable_merges(0).unwrap().is_empty());
    assert!(matches!(
        service.undo_merge(&records[0].id),
        Err(TagError::MergeAlreadyUndone(_))
    ));
}

#[test]
fn get_or_create_and_tree() {
    let dir = TempDir::new().unwrap();
    let mut service = open(&dir);
    let animal = service.get_or_create_tag("Animals", TagKind::Manual, None).unwrap();
    let again = service.get_or_create_tag("animal", TagKind::Manual, None).unwrap();
    assert_eq!(animal, again);
    let dog = service.get_or_create_tag("Dog", TagKind::Ai, Some(0.93)).unwrap();
    service.set_tag_parent(&dog, Some(&animal)).unwrap();

    let tree = service.tag_tree().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].tag.id, animal);
    assert_eq!(tree[0].children[0].tag.id, dog);
    assert!(matches!(
        service.set_tag_parent(&animal, Some(&dog)),
        Err(TagError::HierarchyCycle { .. })
    ));
}

#[test]
fn partial_undo_keeps_links_from_remaining_merges() {
    let dir = TempDir::new().unwrap();
    let mut service = open(&dir);
    seed(
        &mut service,
        &[("t1", "portrait"), ("t2", "portraits"), ("t3", "portait")],
        &[("item-X", "t2"), ("item-X", "t3")],
    );
    let records = service.merge_tags("t1", &["t2", "t3"]).unwrap();

    service.undo_merge(&records[0].id).unwrap();
    assert_eq!(item_tags(&service, "item-X"), vec!["t1", "t2"]);

    service.undo_merge(&records[1].id).unwrap();
    assert_eq!(item_tags(&service, "item-X"), vec!["t2", "t3"]);
}

#[test]
fn undo_brings_back_confidence_and_age() {
    let dir = TempDir::new().unwrap();
    let mut service = open(&dir);
    let mut source = Tag::new("t2", "sunsets", TagKind::AiDetailed).with_confidence(0.93);
    source.created_at = 1_000;
    service
        .store_mut()
        .insert_tag(&Tag::new("t1", "sunset", TagKind::AiDetailed))
        .unwrap();
    service.store_mut().insert_tag(&source).unwrap();

    let records = service.merge_tags("t1", &["t2"]).unwrap();
    drop(service);
    let mut service = open(&dir);
    service.undo_merge(&records[0].id).unwrap();

    let restored = service.store().tag("t2").unwrap().unwrap();
    assert_eq!(restored.confidence, Some(0.93));
    assert_eq!(restored.created_at, 1_000);
    assert_eq!(restored.kind, TagKind::AiDetailed);
}
