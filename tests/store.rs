// Package store behaviour and end-to-end activation on a real filesystem.
#[path = "support/common.rs"]
mod common;

use anyhow::Result;
use jemloader::locator::{location_from_path, path_from_location};
use jemloader::{
    ActivationContext, ActivationError, DuplicateBehavior, JemStore, LocatorError,
    ResourceLocator, SearchPath, StoreConfig,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use common::{MARKER, PackageFixture, manifest_json};

fn open_store(home: &Path, on_duplicate: DuplicateBehavior) -> Result<JemStore> {
    Ok(JemStore::open(StoreConfig {
        home: Some(home.to_path_buf()),
        extra_roots: Vec::new(),
        on_duplicate,
    })?)
}

#[test]
fn installs_package_and_activates_its_lib_directory() -> Result<()> {
    let sources = TempDir::new()?;
    let home = TempDir::new()?;
    let package = PackageFixture::create(sources.path(), "foo", "1.0", &["lib"], &["lib"])?;
    let store = open_store(home.path(), DuplicateBehavior::Skip)?;
    let installed_lib = store.package_dir("foo-1.0").join("lib");

    let context = ActivationContext::new(store)
        .with_search_path(["/usr/lib/site"].into_iter().collect::<SearchPath>());
    assert!(context.activate(&package.identifier())?);

    let expected = location_from_path(&installed_lib).expect("absolute path");
    assert_eq!(
        context.search_path().entries(),
        [expected, "/usr/lib/site".to_string()]
    );
    assert!(installed_lib.join("foo.src").is_file());

    let store = context.locator();
    assert!(store.package_dir("foo-1.0").join(MARKER).is_file());
    assert!(installed_lib.join(MARKER).is_file());
    assert!(
        store
            .home()
            .join("specifications/foo-1.0.json")
            .is_file()
    );
    assert_eq!(store.installed(), vec!["foo-1.0"]);

    assert!(!context.activate(&package.identifier())?);
    assert_eq!(context.search_path().len(), 2);
    Ok(())
}

#[test]
fn missing_require_directory_is_skipped() -> Result<()> {
    let sources = TempDir::new()?;
    let home = TempDir::new()?;
    let package = PackageFixture::create(sources.path(), "foo", "1.0", &["lib", "ext"], &["lib"])?;
    let context = ActivationContext::new(open_store(home.path(), DuplicateBehavior::Skip)?);

    assert!(context.activate(&package.identifier())?);
    let entries = context.search_path();
    assert_eq!(entries.len(), 1);
    assert!(entries.entries()[0].ends_with("/packages/foo-1.0/lib"));
    assert!(
        !context
            .locator()
            .package_dir("foo-1.0")
            .join("ext")
            .exists()
    );
    Ok(())
}

#[test]
fn activation_succeeds_once_directory_appears() -> Result<()> {
    let sources = TempDir::new()?;
    let home = TempDir::new()?;
    let package = PackageFixture::create(sources.path(), "late", "0.1", &["lib"], &[])?;
    let context = ActivationContext::new(open_store(home.path(), DuplicateBehavior::Skip)?);

    assert!(!context.activate(&package.identifier())?);
    assert!(!context.is_active("late"));

    fs::create_dir_all(context.locator().package_dir("late-0.1").join("lib"))?;
    assert!(context.activate(&package.identifier())?);
    assert!(context.is_active("late"));
    Ok(())
}

#[test]
fn manifest_path_is_accepted_as_identifier() -> Result<()> {
    let sources = TempDir::new()?;
    let home = TempDir::new()?;
    let package = PackageFixture::create(sources.path(), "foo", "1.0", &["lib"], &["lib"])?;
    let store = open_store(home.path(), DuplicateBehavior::Skip)?;

    let identifier = package.dir.join("jem.json").display().to_string();
    let raw = store.fetch_manifest(&identifier)?;
    assert!(raw.contains("\"foo\""));
    assert!(store.package_dir("foo-1.0").join("lib/foo.src").is_file());
    Ok(())
}

#[test]
fn duplicate_behaviour_controls_reinstall() -> Result<()> {
    let sources = TempDir::new()?;
    let package = PackageFixture::create(sources.path(), "foo", "1.0", &["lib"], &["lib"])?;
    let source_file = package.dir.join("lib/foo.src");

    let skip_home = TempDir::new()?;
    let skip = open_store(skip_home.path(), DuplicateBehavior::Skip)?;
    skip.fetch_manifest(&package.identifier())?;

    let overwrite_home = TempDir::new()?;
    let overwrite = open_store(overwrite_home.path(), DuplicateBehavior::Overwrite)?;
    overwrite.fetch_manifest(&package.identifier())?;

    let fail_home = TempDir::new()?;
    let fail = open_store(fail_home.path(), DuplicateBehavior::Fail)?;
    fail.fetch_manifest(&package.identifier())?;

    fs::write(&source_file, "// updated\n")?;
    skip.fetch_manifest(&package.identifier())?;
    overwrite.fetch_manifest(&package.identifier())?;
    let err = fail.fetch_manifest(&package.identifier()).unwrap_err();
    assert!(matches!(err, LocatorError::AlreadyInstalled { .. }));

    let installed = |store: &JemStore| {
        fs::read_to_string(store.package_dir("foo-1.0").join("lib/foo.src")).unwrap()
    };
    assert_eq!(installed(&skip), "// foo lib\n");
    assert_eq!(installed(&overwrite), "// updated\n");
    Ok(())
}

#[test]
fn reinstalling_from_the_store_itself_keeps_the_tree() -> Result<()> {
    let sources = TempDir::new()?;
    let home = TempDir::new()?;
    let package = PackageFixture::create(sources.path(), "foo", "1.0", &["lib"], &["lib"])?;
    let store = open_store(home.path(), DuplicateBehavior::Overwrite)?;
    store.fetch_manifest(&package.identifier())?;

    let installed = store.package_dir("foo-1.0").display().to_string();
    store.fetch_manifest(&installed)?;
    assert!(store.package_dir("foo-1.0").join("lib/foo.src").is_file());
    Ok(())
}

#[test]
fn unknown_and_invalid_packages_are_locator_errors() -> Result<()> {
    let sources = TempDir::new()?;
    let home = TempDir::new()?;
    let context = ActivationContext::new(open_store(home.path(), DuplicateBehavior::Skip)?);

    let missing = sources.path().join("absent");
    let err = context.activate(&missing.display().to_string()).unwrap_err();
    assert!(matches!(
        err,
        ActivationError::Locator(LocatorError::NotFound { .. })
    ));

    let broken = sources.path().join("broken");
    fs::create_dir_all(&broken)?;
    fs::write(broken.join("jem.json"), r#"{"schema_version": "jem_manifest_v1"}"#)?;
    let err = context.activate(&broken.display().to_string()).unwrap_err();
    assert!(matches!(
        err,
        ActivationError::Locator(LocatorError::InvalidManifest { .. })
    ));
    assert!(context.search_path().is_empty());
    Ok(())
}

#[test]
fn resources_resolve_from_home_then_extra_roots() -> Result<()> {
    let home = TempDir::new()?;
    let vendor = TempDir::new()?;
    let vendored = vendor.path().join("packages/bar-2.0");
    fs::create_dir_all(&vendored)?;
    fs::write(vendored.join(MARKER), ".")?;

    let store = JemStore::open(StoreConfig {
        home: Some(home.path().to_path_buf()),
        extra_roots: vec![vendor.path().to_path_buf()],
        on_duplicate: DuplicateBehavior::Skip,
    })?;

    let location = store
        .resolve_resource("packages/bar-2.0/.jemdir")
        .expect("vendored marker resolves");
    let resolved = path_from_location(&location).expect("file location");
    assert_eq!(resolved, fs::canonicalize(vendored.join(MARKER))?);

    assert!(store.resolve_resource("packages/absent-1.0/.jemdir").is_none());
    assert!(store.resolve_resource("../outside").is_none());
    assert!(store.resolve_resource("/etc/hosts").is_none());
    Ok(())
}

#[test]
fn require_paths_with_url_syntax_never_reach_the_search_path() -> Result<()> {
    let sources = TempDir::new()?;
    let home = TempDir::new()?;
    let context = ActivationContext::new(open_store(home.path(), DuplicateBehavior::Skip)?);

    // Each package ships a real `lib` directory, so a require path that is
    // read back as `lib` (fragment, query) or as `..` (escapes) would pass
    // the directory check if it were accepted.
    for (name, require_path) in [
        ("escape", "%2e%2e/%2e%2e"),
        ("fragment", "lib#nope"),
        ("query", "lib?x=1"),
    ] {
        let dir = sources.path().join(name);
        fs::create_dir_all(dir.join("lib"))?;
        fs::write(dir.join("jem.json"), manifest_json(name, "1", &[require_path]))?;

        let err = context.activate(&dir.display().to_string()).unwrap_err();
        assert!(
            matches!(
                err,
                ActivationError::Locator(LocatorError::InvalidManifest { .. })
            ),
            "{require_path}: {err}"
        );
        assert!(!context.is_active(name));
    }
    assert!(context.search_path().is_empty());
    assert!(context.locator().installed().is_empty());
    Ok(())
}
