//! Match: prefix queries, filters, paging and resumption.

use crate::common::{Backend, Fixture, Person, ALL_BACKENDS};
use keyfold::{Config, Context, Iri, SeqState};

fn seed_people(fx: &Fixture) {
    let ctx = Context::background();
    for (suffix, name, age) in [("1", "Ann", 25), ("2", "Bob", 41), ("3", "Cid", 33)] {
        fx.store
            .put(&ctx, &Person::new(Iri::join("team:a", suffix), name, age), None)
            .unwrap();
    }
    fx.store
        .put(&ctx, &Person::new(Iri::join("team:b", "1"), "Dee", 50), None)
        .unwrap();
}

fn names(fx: &Fixture, prefix: &str) -> Vec<String> {
    fx.store
        .matching(&Context::background(), &Person::key(Iri::join(prefix, "")))
        .map(|p| p.unwrap().name)
        .collect()
}

#[test]
fn match_two_items_in_two_advances() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        fx.store.put(&ctx, &Person::new(Iri::join("dead:beef", "a"), "A", 1), None).unwrap();
        fx.store.put(&ctx, &Person::new(Iri::join("dead:beef", "b"), "B", 2), None).unwrap();

        let mut seq = fx.store.matching(&ctx, &Person::key(Iri::join("dead:beef", "")));
        assert_eq!(seq.state(), SeqState::Unseeded);

        assert!(seq.advance());
        assert_eq!(seq.value().unwrap().name, "A", "{:?}", backend);
        assert!(seq.advance());
        assert_eq!(seq.value().unwrap().id, Iri::join("dead:beef", "b"));
        assert!(!seq.advance());
        assert_eq!(seq.state(), SeqState::Exhausted);
        assert!(seq.error().is_none());
    }
}

#[test]
fn match_stays_inside_one_partition() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        seed_people(&fx);
        assert_eq!(names(&fx, "team:a"), vec!["Ann", "Bob", "Cid"], "{:?}", backend);
        assert_eq!(names(&fx, "team:b"), vec!["Dee"]);
        assert!(names(&fx, "team:c").is_empty());
    }
}

#[test]
fn match_with_suffix_restricts_sort_keys() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let ctx = Context::background();
        for suffix in ["x:1", "x:2", "y:1"] {
            fx.store.put(&ctx, &Person::new(Iri::join("p", suffix), suffix, 0), None).unwrap();
        }
        let found: Vec<String> = fx
            .store
            .matching(&ctx, &Person::key(Iri::join("p", "x:")))
            .map(|p| p.unwrap().name)
            .collect();
        assert_eq!(found, vec!["x:1", "x:2"], "{:?}", backend);
    }
}

#[test]
fn match_with_filter() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        seed_people(&fx);
        let age = fx.store.attribute("age").unwrap();

        let found: Vec<String> = fx
            .store
            .matching_with(
                &Context::background(),
                &Person::key(Iri::join("team:a", "")),
                Some(age.gt(30)),
            )
            .map(|p| p.unwrap().name)
            .collect();
        assert_eq!(found, vec!["Bob", "Cid"], "{:?}", backend);
    }
}

#[test]
fn match_without_prefix_fails() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        let mut seq = fx
            .store
            .matching(&Context::background(), &Person::key(Iri::default()));
        assert!(!seq.advance());
        assert_eq!(seq.state(), SeqState::Failed);
        assert!(seq.error().unwrap().is_invalid_key());
    }
}

#[test]
fn stream_mode_crosses_page_boundaries() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::with_config(backend, Config::new("people").with_page_size(1));
        seed_people(&fx);

        let mut seq = fx
            .store
            .matching(&Context::background(), &Person::key(Iri::join("team:a", "")));
        let ages = seq.fold_records(0, |sum, p| sum + p.age).unwrap();
        assert_eq!(ages, 25 + 41 + 33, "{:?}", backend);
        assert!(seq.pages() >= 3);
        assert_eq!(seq.state(), SeqState::Exhausted);
    }
}

#[test]
fn limited_page_resumes_from_cursor() {
    for backend in ALL_BACKENDS {
        let fx = Fixture::new(backend);
        seed_people(&fx);
        let ctx = Context::background();
        let key = Person::key(Iri::join("team:a", ""));

        let mut first = fx.store.matching(&ctx, &key).limit(2);
        let mut seen = Vec::new();
        first
            .fmap(|p| {
                seen.push(p.name);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["Ann", "Bob"], "{:?}", backend);
        assert_eq!(first.pages(), 1);
        assert!(!first.cursor().is_zero());

        let token = first.cursor().to_token();
        let cursor = keyfold::Cursor::from_token(&token).unwrap();
        let rest: Vec<String> = fx
            .store
            .matching(&ctx, &key)
            .continue_from(cursor)
            .map(|p| p.unwrap().name)
            .collect();
        assert_eq!(rest, vec!["Cid"]);
    }
}

#[test]
fn reverse_scan_on_table_backend() {
    let fx = Fixture::new(Backend::Table);
    seed_people(&fx);
    let found: Vec<String> = fx
        .store
        .matching(&Context::background(), &Person::key(Iri::join("team:a", "")))
        .reverse()
        .unwrap()
        .map(|p| p.unwrap().name)
        .collect();
    assert_eq!(found, vec!["Cid", "Bob", "Ann"]);
}

#[test]
fn reverse_scan_on_object_backend_fails() {
    for backend in [Backend::ObjectMemory, Backend::ObjectFs] {
        let fx = Fixture::new(backend);
        seed_people(&fx);
        let mut seq = fx
            .store
            .matching(&Context::background(), &Person::key(Iri::join("team:a", "")))
            .reverse()
            .unwrap();
        assert!(!seq.advance());
        assert_eq!(seq.state(), SeqState::Failed, "{:?}", backend);
    }
}

#[test]
fn reverse_after_first_fetch_is_rejected() {
    let fx = Fixture::new(Backend::Table);
    seed_people(&fx);
    let mut seq = fx
        .store
        .matching(&Context::background(), &Person::key(Iri::join("team:a", "")));
    assert!(seq.advance());
    assert!(seq.reverse().is_err());
}
