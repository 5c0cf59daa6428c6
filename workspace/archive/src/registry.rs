use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Process-wide registry of per-repository mutexes, keyed by the archive's
/// base directory, so two `ArchiveAdapter` handles pointed at the same
/// repository never interleave a reprepro invocation (§4.6).
fn registry() -> &'static Mutex<HashMap<String, Arc<Mutex<()>>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn lock_for(key: &str) -> Arc<Mutex<()>> {
    let mut map = registry().lock().expect("archive lock registry poisoned");
    map.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_returns_same_mutex() {
        let a = lock_for("/var/archive/test");
        let b = lock_for("/var/archive/test");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_keys_return_different_mutexes() {
        let a = lock_for("/var/archive/one");
        let b = lock_for("/var/archive/two");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
