use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use sabre::{Environment, ErrorKind, FileStore, Store};

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn set_modified(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn cache_file(cache: &Path) -> std::path::PathBuf {
    let mut entries: Vec<_> = fs::read_dir(cache)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    entries.remove(0)
}

#[test]
fn store_compiles_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views");
    let cache = dir.path().join("cache");
    write(&views.join("users/show.sabre.html"), "{{ name }}");

    let store = FileStore::new(&views, &cache);
    assert!(store.exists("users.show"));
    assert!(!store.exists("users.missing"));

    let compiled = store.compiled("users.show").unwrap();
    assert_eq!(&*compiled, "<% echo name; %>");

    let cached = cache_file(&cache);
    assert_eq!(fs::read_to_string(cached).unwrap(), "<% echo name; %>");
}

#[test]
fn store_uses_fresh_cache() {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views");
    let cache = dir.path().join("cache");
    let source = views.join("index.sabre.html");
    write(&source, "{{ a }}");

    let store = FileStore::new(&views, &cache);
    store.compiled("index").unwrap();

    // The source is older than the cache, so the cache file is used as is.
    set_modified(&source, SystemTime::now() - Duration::from_secs(60));
    fs::write(cache_file(&cache), "cached").unwrap();
    assert_eq!(&*store.compiled("index").unwrap(), "cached");
}

#[test]
fn store_recompiles_modified_source() {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views");
    let cache = dir.path().join("cache");
    let source = views.join("index.sabre.html");
    write(&source, "{{ a }}");

    let store = FileStore::new(&views, &cache);
    assert_eq!(&*store.compiled("index").unwrap(), "<% echo a; %>");

    write(&source, "{{ b }}");
    set_modified(&source, SystemTime::now() + Duration::from_secs(60));
    assert_eq!(&*store.compiled("index").unwrap(), "<% echo b; %>");
}

#[test]
fn store_view_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("views"), dir.path().join("cache"));
    let err = store.compiled("missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ViewNotFound);
}

#[test]
fn store_namespace_and_literal_path() {
    let dir = tempfile::tempdir().unwrap();
    let admin = dir.path().join("admin");
    write(&admin.join("dashboard.html"), "admin");
    let literal = dir.path().join("some.file.txt");
    write(&literal, "literal");

    let mut store = FileStore::new(dir.path().join("views"), dir.path().join("cache"))
        .with_extension(".html");
    store.add_namespace("admin", &admin);

    assert_eq!(&*store.compiled("admin::dashboard").unwrap(), "admin");
    let name = format!("path: {}", literal.display());
    assert_eq!(&*store.compiled(&name).unwrap(), "literal");
    assert!(!store.exists("other::dashboard"));
}

#[test]
fn store_environment_renders_layout() {
    let dir = tempfile::tempdir().unwrap();
    let views = dir.path().join("views");
    write(
        &views.join("layouts/main.sabre.html"),
        "<body>@yield('content')</body>",
    );
    write(
        &views.join("home.sabre.html"),
        "@extends('layouts.main')\n@section('content')Hi {{ name }}@stop",
    );

    let env = Environment::new(FileStore::new(&views, dir.path().join("cache")));
    let result = env.make("home").with("name", "John").get().unwrap();
    assert_eq!(result, "\n<body>Hi John</body>");
}
