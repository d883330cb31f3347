mod common;

use common::record;
use member_runner::error::{Error, Result};
use member_runner::store::ProcessRegistry;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_save_then_find_round_trip() -> Result<()> {
    let home = TempDir::new().unwrap();
    let registry = ProcessRegistry::open(home.path())?;

    let saved = record("eager_hopper", 4242, home.path())
        .with_member_info(Some("dev".to_string()), Some("5701".to_string()));
    registry.save(&saved)?;

    let found = registry.find("eager_hopper")?;
    assert_eq!(found, Some(saved));
    assert!(registry.exists("eager_hopper")?);

    // A fresh handle reads the same durable state
    let reopened = ProcessRegistry::open(home.path())?;
    assert_eq!(reopened.find_all()?, registry.find_all()?);

    Ok(())
}

#[test]
fn test_find_unknown_is_none() -> Result<()> {
    let home = TempDir::new().unwrap();
    let registry = ProcessRegistry::open(home.path())?;

    assert_eq!(registry.find("keen_turing")?, None);
    assert!(!registry.exists("keen_turing")?);

    Ok(())
}

#[test]
fn test_remove_unknown_leaves_file_untouched() -> Result<()> {
    let home = TempDir::new().unwrap();
    let registry = ProcessRegistry::open(home.path())?;
    registry.save(&record("eager_hopper", 1, home.path()))?;
    let before = fs::read(registry.path()).unwrap();

    let err = registry.remove("keen_turing").unwrap_err();
    assert!(matches!(err, Error::NotFound(ref id) if id == "keen_turing"));
    assert_eq!(fs::read(registry.path()).unwrap(), before);

    Ok(())
}

#[test]
fn test_remove_returns_record() -> Result<()> {
    let home = TempDir::new().unwrap();
    let registry = ProcessRegistry::open(home.path())?;
    let saved = record("eager_hopper", 1, home.path());
    registry.save(&saved)?;
    registry.save(&record("keen_turing", 2, home.path()))?;

    assert_eq!(registry.remove("eager_hopper")?, saved);
    let remaining: Vec<String> = registry.find_all()?.into_keys().collect();
    assert_eq!(remaining, vec!["keen_turing"]);

    Ok(())
}

#[test]
fn test_garbage_file_is_corrupt() {
    let home = TempDir::new().unwrap();
    let registry = ProcessRegistry::open(home.path()).unwrap();
    fs::write(registry.path(), [0xde, 0xad, 0xbe, 0xef, b'{', 0x00, 0x7f]).unwrap();

    assert!(matches!(
        registry.find_all().unwrap_err(),
        Error::StoreCorrupt { .. }
    ));
    // Writers fail closed too instead of replacing the unreadable file
    assert!(matches!(
        registry.save(&record("eager_hopper", 1, home.path())).unwrap_err(),
        Error::StoreCorrupt { .. }
    ));
}

#[test]
fn test_truncated_document_is_corrupt() -> Result<()> {
    let home = TempDir::new().unwrap();
    let registry = ProcessRegistry::open(home.path())?;
    registry.save(&record("eager_hopper", 1, home.path()))?;
    registry.save(&record("keen_turing", 2, home.path()))?;

    let content = fs::read(registry.path()).unwrap();
    fs::write(registry.path(), &content[..content.len() / 2]).unwrap();

    assert!(matches!(
        registry.find_all().unwrap_err(),
        Error::StoreCorrupt { .. }
    ));
    Ok(())
}

#[test]
fn test_concurrent_saves_lose_no_updates() -> Result<()> {
    let home = TempDir::new().unwrap();
    let writers = 8;
    let per_writer = 25;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let home = home.path().to_path_buf();
            std::thread::spawn(move || {
                // Separate handles, as separate CLI invocations would have
                let registry = ProcessRegistry::open(&home).unwrap();
                for i in 0..per_writer {
                    let identity = format!("writer{}_member{}", w, i);
                    registry.save(&record(&identity, i, &home)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let registry = ProcessRegistry::open(home.path())?;
    let all = registry.find_all()?;
    assert_eq!(all.len(), writers * per_writer as usize);
    for w in 0..writers {
        for i in 0..per_writer {
            assert!(all.contains_key(&format!("writer{}_member{}", w, i)));
        }
    }

    Ok(())
}

#[test]
fn test_concurrent_save_and_remove() -> Result<()> {
    let home = TempDir::new().unwrap();
    let registry = ProcessRegistry::open(home.path())?;
    for i in 0..20 {
        registry.save(&record(&format!("old{}", i), i, home.path()))?;
    }

    let remover = {
        let registry = registry.clone();
        std::thread::spawn(move || {
            for i in 0..20 {
                registry.remove(&format!("old{}", i)).unwrap();
            }
        })
    };
    let saver = {
        let registry = ProcessRegistry::open(home.path())?;
        let home = home.path().to_path_buf();
        std::thread::spawn(move || {
            for i in 0..20 {
                registry.save(&record(&format!("new{}", i), i, &home)).unwrap();
            }
        })
    };
    remover.join().unwrap();
    saver.join().unwrap();

    let keys: Vec<String> = registry.find_all()?.into_keys().collect();
    assert_eq!(keys.len(), 20);
    assert!(keys.iter().all(|k| k.starts_with("new")));

    Ok(())
}
