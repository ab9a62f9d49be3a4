//! Property-based tests for predicates and the in-memory store.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::query::{Column, Predicate, Query};
    use crate::record::{AccessFields, Record};
    use crate::schema::{EntitySchema, Schema};
    use crate::traits::Store;
    use crate::InMemoryStore;
    use proptest::prelude::*;
    use rowguard_core::{AccessLevel, AllowList, RecordId, UserId};

    fn level() -> impl Strategy<Value = AccessLevel> {
        prop::sample::select(AccessLevel::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn test_contains_agrees_with_allow_list(
            members in prop::collection::btree_set(1i64..500, 1..10),
            candidate in 1i64..500,
            level in level(),
        ) {
            let list = AllowList::encode(members.iter().copied().map(UserId::new)).unwrap();
            let mut record = Record::new("Doc", RecordId::new(1));
            record.store_access_cache(AccessFields::new(level, Some(list.clone())));

            let needle = AllowList::needle(UserId::new(candidate));
            let predicate = Predicate::Contains(Column::PermittedUsers, needle);
            prop_assert_eq!(predicate.matches(&record), list.contains(UserId::new(candidate)));
        }

        #[test]
        fn test_fetch_matches_manual_filter(titles in prop::collection::vec("[ab]{1,2}", 0..20)) {
            let schema = Schema::new(vec![EntitySchema::new("Tag").scalar("name")]).unwrap();
            let store = InMemoryStore::new(schema).unwrap();
            for title in &titles {
                store.insert(Record::draft("Tag").with("name", title.as_str()).unwrap()).unwrap();
            }
            let query = Query::all("Tag").filter(Predicate::eq(Column::field("name"), "a"));
            let fetched = store.fetch(&query).unwrap().len();
            prop_assert_eq!(fetched, titles.iter().filter(|t| t.as_str() == "a").count());
        }
    }
}
