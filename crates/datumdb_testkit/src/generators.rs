//! Property-based generators for values, idents, and claims.

use chrono::DateTime;
use datumdb_core::{sys, Claim, Id, TempId, Value};
use proptest::prelude::*;

/// A strategy over user idents: two short lowercase segments.
pub fn ident_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", "[a-z]{1,8}").prop_map(|(ns, name)| format!("{ns}/{name}"))
}

/// A strategy over values of the given attribute type.
pub fn value_strategy(value_type: Id) -> BoxedStrategy<Value> {
    match value_type {
        sys::ATTR_TYPE_STRING => "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Str).boxed(),
        sys::ATTR_TYPE_INT => any::<i64>().prop_map(Value::Int).boxed(),
        sys::ATTR_TYPE_BOOL => any::<bool>().prop_map(Value::Bool).boxed(),
        sys::ATTR_TYPE_FLOAT => (-1.0e9f64..1.0e9).prop_map(Value::Float).boxed(),
        sys::ATTR_TYPE_INST => (0i64..4_102_444_800_000)
            .prop_map(|ms| {
                Value::Inst(DateTime::from_timestamp_millis(ms).expect("in-range instant"))
            })
            .boxed(),
        other => panic!("no value strategy for type {other}"),
    }
}

/// The scalar-typed person attributes, paired with their value types.
pub fn person_scalar_attrs() -> Vec<(&'static str, Id)> {
    vec![
        ("person/age", sys::ATTR_TYPE_INT),
        ("person/score", sys::ATTR_TYPE_FLOAT),
        ("person/likes-pickles", sys::ATTR_TYPE_BOOL),
        ("person/born", sys::ATTR_TYPE_INST),
        ("person/alias", sys::ATTR_TYPE_STRING),
    ]
}

/// A strategy over assertion claims against the person schema, using a
/// small pool of temp ids so entities collide and merge.
pub fn person_claim_strategy() -> impl Strategy<Value = Claim> {
    let scalar = (0usize..4, 0usize..person_scalar_attrs().len()).prop_flat_map(|(t, i)| {
        let (attr, value_type) = person_scalar_attrs()[i];
        value_strategy(value_type)
            .prop_map(move |v| Claim::assert(TempId::from(t.to_string()), attr, v))
    });
    let name = (0usize..4, "[a-f]{1,4}").prop_map(|(t, name)| {
        Claim::assert(TempId::from(t.to_string()), "person/name", name)
    });
    let friend = (0usize..4, 0usize..4).prop_map(|(t, f)| {
        Claim::assert(
            TempId::from(t.to_string()),
            "person/friend",
            TempId::from(f.to_string()),
        )
    });
    prop_oneof![4 => scalar, 2 => name, 1 => friend]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn idents_are_valid_for_users(ident in ident_strategy()) {
            prop_assert!(!ident.starts_with("sys/"));
            prop_assert!(ident.contains('/'));
        }

        #[test]
        fn values_match_their_type(v in value_strategy(sys::ATTR_TYPE_INST)) {
            prop_assert!(matches!(v, Value::Inst(_)));
        }

        #[test]
        fn floats_are_finite(v in value_strategy(sys::ATTR_TYPE_FLOAT)) {
            match v {
                Value::Float(f) => prop_assert!(f.is_finite()),
                other => prop_assert!(false, "unexpected {other:?}"),
            }
        }
    }
}
