//! Get / Put / Remove / Update round trips.

use crate::common::{Fixture, Person, ALL_BACKENDS};
use keyfold::{CancelToken, Context, Iri};

#[test]
fn put_then_get_returns_the_record() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let verner = Person::new(Iri::join("dead:beef", ""), "Verner Pleishner", 64);

        fx.store.put(&ctx, &verner, None).unwrap();
        let got = fx.store.get(&ctx, &Person::key(Iri::join("dead:beef", ""))).unwrap();
        assert_eq!(got, verner, "{:?}", backend);
    }
}

#[test]
fn put_overwrites() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "1");

        fx.store.put(&ctx, &Person::new(id.clone(), "A", 1), None).unwrap();
        fx.store.put(&ctx, &Person::new(id.clone(), "B", 2), None).unwrap();
        let got = fx.store.get(&ctx, &Person::key(id)).unwrap();
        assert_eq!((got.name.as_str(), got.age), ("B", 2), "{:?}", backend);
    }
}

#[test]
fn get_missing_is_not_found() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let err = fx
            .store
            .get(&Context::background(), &Person::key(Iri::join("dead:beef", "nope")))
            .unwrap_err();
        assert!(err.is_not_found(), "{:?}: {}", backend, err);
        assert_eq!(err.operation(), Some("get"));
    }
}

#[test]
fn remove_then_get_is_not_found() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "");

        fx.store.put(&ctx, &Person::new(id.clone(), "Verner Pleishner", 64), None).unwrap();
        fx.store.remove(&ctx, &Person::key(id.clone()), None).unwrap();
        let err = fx.store.get(&ctx, &Person::key(id)).unwrap_err();
        assert!(err.is_not_found(), "{:?}: {}", backend, err);
    }
}

#[test]
fn remove_missing_without_guard_succeeds() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        fx.store
            .remove(&Context::background(), &Person::key(Iri::join("dead:beef", "x")), None)
            .unwrap();
    }
}

#[test]
fn update_returns_the_full_record() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "u");

        fx.store.put(&ctx, &Person::new(id.clone(), "Verner Pleishner", 64), None).unwrap();
        let updated = fx
            .store
            .update(&ctx, &Person::new(id.clone(), "Verner Pleishner", 65), None)
            .unwrap();
        assert_eq!(updated.age, 65, "{:?}", backend);
        assert_eq!(updated.id, id);
        assert_eq!(fx.store.get(&ctx, &Person::key(id)).unwrap().age, 65);
    }
}

#[test]
fn update_without_guard_creates_missing_record() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        let id = Iri::join("dead:beef", "fresh");

        let created = fx.store.update(&ctx, &Person::new(id.clone(), "New", 1), None).unwrap();
        assert_eq!(created.name, "New", "{:?}", backend);
        assert!(fx.store.get(&ctx, &Person::key(id)).is_ok());
    }
}

#[test]
fn record_without_prefix_is_invalid_key() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let err = fx
            .store
            .put(&Context::background(), &Person::new(Iri::default(), "Nobody", 0), None)
            .unwrap_err();
        assert!(err.is_invalid_key(), "{:?}: {}", backend, err);
    }
}

#[test]
fn canceled_context_stops_the_call() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let token = CancelToken::new();
        token.cancel();
        let ctx = Context::background().with_cancel(token);

        let err = fx
            .store
            .put(&ctx, &Person::new(Iri::join("dead:beef", ""), "V", 1), None)
            .unwrap_err();
        assert!(err.is_canceled(), "{:?}: {}", backend, err);
    }
}
