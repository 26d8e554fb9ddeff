//! The cache is process-wide, so everything that clears it or switches
//! interning lives in this one test.

use erasure::{
    Any, Binding, cache,
    requirements::{CopyConstructible, Destructible, Typeid},
    slots::{Single, This},
};

type Value = (CopyConstructible, Typeid);

#[test]
fn test_cache_configuration() {
    cache::clear();
    assert!(cache::is_interning());
    assert_eq!(cache::table_count(), 0);
    assert_eq!(cache::concept_count(), 0);

    let first: Any<Value> = Any::new(1_u8);
    let second: Any<Value> = Any::new(2_u8);
    assert!(first.binding().ptr_eq(second.binding()));
    assert_eq!(cache::table_count(), 1);
    assert_eq!(cache::concept_count(), 1);

    cache::set_interning(false);
    let third: Any<Value> = Any::new(3_u8);
    assert!(!third.binding().ptr_eq(first.binding()));
    assert_eq!(third.binding(), first.binding());
    assert_eq!(cache::table_count(), 1);
    cache::set_interning(true);

    cache::clear();
    assert_eq!(cache::table_count(), 0);
    assert_eq!(cache::concept_count(), 0);

    let copy = first.clone();
    assert_eq!(copy.downcast_ref::<u8>(), Some(&1));
    let rebuilt = Binding::<Value>::new::<Single<This, u8>>();
    assert!(!rebuilt.ptr_eq(first.binding()));
    assert_eq!(&rebuilt, first.binding());

    let unrelated: Any<Destructible> = Any::new(());
    drop(unrelated);
    assert_eq!(cache::table_count(), 2);
}
