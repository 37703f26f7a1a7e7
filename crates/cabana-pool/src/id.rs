use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{PoolError, PoolResult};

pub trait IdValueType: Sized {
    fn first() -> Self;
    fn next(v: Self) -> PoolResult<Self>;
}

macro_rules! impl_integer_id_value_type {
    ($type:ty) => {
        impl IdValueType for $type {
            fn first() -> Self {
                1
            }

            fn next(v: Self) -> PoolResult<Self> {
                v.checked_add(1)
                    .ok_or(PoolError::InternalError("ID overflow".to_string()))
            }
        }
    };
}

impl_integer_id_value_type!(u64);

pub trait IdType: Sized {
    type Value: IdValueType + From<Self> + Into<Self>;
}

macro_rules! define_id_type {
    ($name:ident, $value_type:ty) => {
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name($value_type);

        impl IdType for $name {
            type Value = $value_type;
        }

        impl From<$value_type> for $name {
            fn from(id: $value_type) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $value_type {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id_type!(WorkerId, u64);
define_id_type!(ClientRef, u64);
define_id_type!(MonitorToken, u64);

/// A counter for coordinator-side ids.
/// Worker ids are never reused, so a late exit notification for a dismissed
/// worker can never be confused with a live one.
#[derive(Debug)]
pub struct IdGenerator<T: IdType> {
    next_value: T::Value,
    phantom: PhantomData<T>,
}

impl<T: IdType> IdGenerator<T>
where
    T::Value: Copy,
{
    pub fn new() -> Self {
        Self {
            next_value: T::Value::first(),
            phantom: PhantomData,
        }
    }

    pub fn next(&mut self) -> PoolResult<T> {
        let value = self.next_value;
        self.next_value = T::Value::next(value)?;
        Ok(value.into())
    }
}

/// A counter for client-side ids, shared by all clones of a pool handle.
/// Clients mint their request and liveness ids before the request is sent,
/// so these cannot come from coordinator state.
#[derive(Debug)]
pub struct RefGenerator {
    next_value: AtomicU64,
}

impl RefGenerator {
    pub fn new() -> Self {
        Self {
            next_value: AtomicU64::new(1),
        }
    }

    pub fn client_ref(&self) -> ClientRef {
        self.next_value.fetch_add(1, Ordering::Relaxed).into()
    }

    pub fn monitor_token(&self) -> MonitorToken {
        self.next_value.fetch_add(1, Ordering::Relaxed).into()
    }
}
