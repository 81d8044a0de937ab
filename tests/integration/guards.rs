//! Conditional writes and predicate construction.

use crate::common::{Fixture, Person, ALL_BACKENDS};
use keyfold::{attribute, Context, Iri};

fn seeded(fx: &Fixture, id: &Iri) {
    fx.store
        .put(&Context::background(), &Person::new(id.clone(), "Verner Pleishner", 64), None)
        .unwrap();
}

#[test]
fn put_with_matching_guard_succeeds() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "g");
        seeded(&fx, &id);

        let age = fx.store.attribute("age").unwrap();
        fx.store
            .put(&ctx, &Person::new(id.clone(), "Verner Pleishner", 65), Some(&age.eq(64)))
            .unwrap();
        assert_eq!(fx.store.get(&ctx, &Person::key(id)).unwrap().age, 65, "{:?}", backend);
    }
}

#[test]
fn put_with_failed_value_guard_is_conflict() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "g");
        seeded(&fx, &id);

        let age = fx.store.attribute("age").unwrap();
        let err = fx
            .store
            .put(&ctx, &Person::new(id.clone(), "Other", 1), Some(&age.eq(10)))
            .unwrap_err();
        assert!(err.is_conflict(), "{:?}: {}", backend, err);
        assert!(!err.is_gone());
        assert_eq!(err.operation(), Some("put"));

        // the stored record is untouched
        assert_eq!(fx.store.get(&ctx, &Person::key(id)).unwrap().name, "Verner Pleishner");
    }
}

#[test]
fn put_if_absent_rejects_existing_record() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "g");
        let guard = fx.store.hash_key().not_exists();

        fx.store.put(&ctx, &Person::new(id.clone(), "First", 1), Some(&guard)).unwrap();
        let err = fx
            .store
            .put(&ctx, &Person::new(id, "Second", 2), Some(&guard))
            .unwrap_err();
        assert!(err.is_conflict(), "{:?}: {}", backend, err);
    }
}

#[test]
fn put_requiring_existing_record_is_gone() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let guard = fx.store.hash_key().exists();
        let err = fx
            .store
            .put(
                &Context::background(),
                &Person::new(Iri::join("dead:beef", "missing"), "X", 1),
                Some(&guard),
            )
            .unwrap_err();
        assert!(err.is_gone(), "{:?}: {}", backend, err);
    }
}

#[test]
fn update_with_not_exists_on_existing_is_gone() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "g");
        seeded(&fx, &id);

        let guard = fx.store.attribute("name").unwrap().not_exists();
        let err = fx
            .store
            .update(&ctx, &Person::new(id, "Changed", 1), Some(&guard))
            .unwrap_err();
        assert!(err.is_gone(), "{:?}: {}", backend, err);
        assert_eq!(err.operation(), Some("update"));
    }
}

#[test]
fn update_requiring_existing_record_is_gone_when_missing() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "missing");

        let guard = fx.store.hash_key().exists();
        let err = fx
            .store
            .update(&ctx, &Person::new(id.clone(), "X", 1), Some(&guard))
            .unwrap_err();
        assert!(err.is_gone(), "{:?}: {}", backend, err);
        assert!(fx.store.get(&ctx, &Person::key(id)).unwrap_err().is_not_found());
    }
}

#[test]
fn remove_with_failed_guard_keeps_the_record() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "g");
        seeded(&fx, &id);

        let guard = fx.store.attribute("age").unwrap().gt(100);
        let err = fx
            .store
            .remove(&ctx, &Person::key(id.clone()), Some(&guard))
            .unwrap_err();
        assert!(err.is_gone(), "{:?}: {}", backend, err);
        assert!(fx.store.get(&ctx, &Person::key(id)).is_ok());
    }
}

#[test]
fn predicate_on_unmapped_field_is_schema_error() {
    let err = attribute::<Person>("scratch").unwrap_err();
    assert!(err.is_schema(), "{}", err);

    let err = attribute::<Person>("nonexistent").unwrap_err();
    assert!(err.is_schema(), "{}", err);

    assert_eq!(attribute::<Person>("name").unwrap().wire(), "someName");
}
