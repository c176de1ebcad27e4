//! Tests for the container tree

use super::*;
use crate::io::ByteView;

fn sample_tree() -> Folder {
    let mut root = Folder::new("root");
    root.add_file(GameFile::new("top.bin", vec![0u8; 4]));

    let mut data = Folder::new("data");
    data.add_file(GameFile::new("a", vec![0x41; 100]));
    let mut deep = Folder::new("x");
    let mut y = Folder::new("y");
    let mut z = Folder::new("z");
    z.add_file(GameFile::new("leaf", vec![1, 2, 3]));
    y.add_folder(z);
    deep.add_folder(y);
    data.add_folder(deep);
    data.add_file(GameFile::new("b", vec![0x42; 200]));
    root.add_folder(data);
    root
}

#[test]
fn test_paths_follow_attachment() {
    let root = sample_tree();
    let leaf = root.search_file("/root/data/x/y/z/leaf").unwrap();
    assert_eq!(leaf.path(), "/root/data/x/y/z/leaf");
    assert_eq!(leaf.name(), "leaf");
    assert_eq!(root.folder("data").unwrap().path(), "/root/data");
}

#[test]
fn test_anonymous_root() {
    let mut root = Folder::new("");
    root.add_file(GameFile::new("game.nds", vec![]));
    assert_eq!(root.path(), "");
    assert_eq!(root.file("game.nds").unwrap().path(), "/game.nds");
    assert!(root.search_file("/game.nds").is_some());
}

#[test]
fn test_search_absolute_and_relative() {
    let root = sample_tree();
    assert_eq!(root.search_file("/root/data/a").unwrap().len(), 100);
    assert_eq!(root.search_file("data/b").unwrap().len(), 200);
    assert!(root.search_folder("data/x/y").is_some());
    assert!(matches!(root.search("/root"), Some(NodeRef::Folder(_))));
}

#[test]
fn test_search_misses() {
    let root = sample_tree();
    assert!(root.search("/root/data/missing").is_none());
    assert!(root.search("/other/data/a").is_none());
    // Kind mismatches
    assert!(root.search_file("/root/data").is_none());
    assert!(root.search_folder("/root/data/a").is_none());
    // Descending below a file without children
    assert!(root.search("/root/data/a/inner").is_none());
}

#[test]
fn test_separator_tolerance() {
    let root = sample_tree();
    assert!(root.search_file("//root//data/a/").is_some());
}

#[test]
fn test_add_replaces_same_name() {
    let mut root = sample_tree();
    let data = root.folder_mut("data").unwrap();
    data.add_file(GameFile::new("a", vec![9u8; 5]));

    assert_eq!(data.len(), 3);
    let names: Vec<&str> = data.children().iter().map(Node::name).collect();
    assert_eq!(names, vec!["a", "x", "b"]);
    assert_eq!(root.search_file("/root/data/a").unwrap().len(), 5);
}

#[test]
fn test_search_through_file_children() {
    let mut root = Folder::new("");
    let mut rom = GameFile::new("rom.nds", vec![0u8; 16]);
    let mut data = Folder::new("data");
    data.add_file(GameFile::new("inner.bin", vec![7u8; 2]));
    rom.add_folder(data);
    root.add_file(rom);

    let inner = root.search_file("/rom.nds/data/inner.bin").unwrap();
    assert_eq!(inner.path(), "/rom.nds/data/inner.bin");

    let rom = root.file("rom.nds").unwrap();
    assert!(rom.search_file("data/inner.bin").is_some());
    assert!(matches!(rom.search("/rom.nds"), Some(NodeRef::File(_))));

    root.search_file_mut("/rom.nds/data/inner.bin")
        .unwrap()
        .replace_data(vec![8u8; 3]);
    assert_eq!(
        root.search_file("/rom.nds/data/inner.bin").unwrap().data().as_slice(),
        &[8, 8, 8]
    );
}

#[test]
fn test_walk_order() {
    let root = sample_tree();
    let data = root.folder("data").unwrap();
    let names: Vec<&str> = data.walk_files().iter().map(|f| f.name()).collect();
    // Files of a folder first, then its subfolders
    assert_eq!(names, vec!["a", "b", "leaf"]);
    assert_eq!(root.count_files(), 4);
}

#[test]
fn test_reattach_repaths_subtree() {
    let mut root = sample_tree();
    let node = root.folder_mut("data").unwrap().remove("x").unwrap();
    let Node::Folder(x) = node else {
        panic!("expected a folder");
    };

    let mut other = Folder::new("other");
    other.add_folder(x);
    assert!(other.search_file("/other/x/y/z/leaf").is_some());
    assert!(root.search("/root/data/x").is_none());
}

#[test]
fn test_dependencies_are_paths() {
    let mut file = GameFile::new("a", vec![]);
    file.add_dependency("/root/data/b");
    file.add_dependency("/root/data/b");
    file.add_dependencies(["/root/top.bin"]);
    assert_eq!(file.dependencies(), &["/root/data/b", "/root/top.bin"]);
}

#[test]
fn test_window_content_is_shared() {
    let image = ByteView::from_vec((0u8..=255).collect());
    let mut root = Folder::new("img");
    root.add_file(GameFile::new("w", image.slice(16, 8).unwrap()));

    let w = root.file("w").unwrap();
    assert!(w.data().shares_backing_with(&image));
    assert_eq!(w.data().as_slice(), &[16, 17, 18, 19, 20, 21, 22, 23]);
}

#[test]
fn test_codec_calls_need_a_format() {
    let mut file = GameFile::new("plain", vec![1u8]);
    assert!(!file.has_format());
    assert!(matches!(
        file.read_format(),
        Err(crate::error::NitroError::NoFormat(path)) if path == "/plain"
    ));
}

#[test]
fn test_raw_names_keep_their_bytes() {
    // Shift-JIS "あ" followed by ASCII
    let file = GameFile::from_raw_name(vec![0x82, 0xA0, b'.', b'b'], vec![]);
    assert_eq!(file.name(), "%82%A0.b");
    assert_eq!(file.raw_name(), &[0x82, 0xA0, b'.', b'b']);

    let mut root = Folder::new("root");
    root.add_folder(Folder::from_raw_name(vec![0xFF]));
    let node = root.child("%FF").unwrap();
    assert_eq!(node.raw_name(), &[0xFF]);
    assert_eq!(node.path(), "/root/%FF");

    // Plain UTF-8 names are stored as themselves
    let plain = GameFile::from_raw_name("é.bin".as_bytes().to_vec(), vec![]);
    assert_eq!(plain.name(), "é.bin");
    assert_eq!(plain.raw_name(), "é.bin".as_bytes());
    assert_eq!(display_name(&[b'a', 0xE3, 0x81]), "a%E3%81");
}
