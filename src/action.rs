//! Action builder types.
//!
//! Every action is a builder that runs when it is awaited:
//!
//! ```no_run
//! # use mongodb_bulk::{bson::doc, error::Result, options::WriteConcern, Collection};
//! # async fn run(coll: Collection) -> Result<()> {
//! let mut bulk = coll.initialize_ordered_bulk_op(None);
//! bulk.insert(doc! { "x": 1 })?;
//! let result = bulk.execute().write_concern(WriteConcern::majority()).await?;
//! # Ok(())
//! # }
//! ```

mod bulk_write;

use std::future::IntoFuture;

pub use crate::bulk::Execute;
pub use bulk_write::ClientBulkWrite;

pub(crate) mod private {
    pub trait Sealed {}
}

/// A pending action to execute on the server. The action can be configured via chained methods
/// and executed via `await`.
pub trait Action: private::Sealed + IntoFuture {
    /// If the value is `Some`, call the provided function on `self`. Convenient for chained
    /// updates with values that need to be set conditionally.
    fn optional<Value>(self, value: Option<Value>, f: impl FnOnce(Self, Value) -> Self) -> Self
    where
        Self: Sized,
    {
        match value {
            Some(value) => f(self, value),
            None => self,
        }
    }
}

/// Implements [`Action`] and [`IntoFuture`] for a builder with an
/// `async fn execute_inner(self) -> Result<$out>` method.
macro_rules! action_impl {
    (impl<$lt:lifetime> IntoFuture for $action:ty => $out:ty) => {
        impl<$lt> $crate::action::private::Sealed for $action {}

        impl<$lt> $crate::action::Action for $action {}

        impl<$lt> std::future::IntoFuture for $action {
            type Output = $crate::error::Result<$out>;
            type IntoFuture = $crate::BoxFuture<$lt, Self::Output>;

            fn into_future(self) -> Self::IntoFuture {
                Box::pin(self.execute_inner())
            }
        }
    };
}
pub(crate) use action_impl;

macro_rules! option_setters {
    (
        $opt_field:ident: $opt_field_ty:ty;
        $(
            $opt_name:ident: $opt_ty:ty,
        )*
    ) => {
        fn options(&mut self) -> &mut $opt_field_ty {
            self.$opt_field.get_or_insert_with(<$opt_field_ty>::default)
        }

        /// Set all options. Note that this will replace all previous values set.
        pub fn with_options(mut self, value: impl Into<Option<$opt_field_ty>>) -> Self {
            self.$opt_field = value.into();
            self
        }

        $(
            #[doc = concat!(
                "Set the [`",
                stringify!($opt_field_ty),
                "::",
                stringify!($opt_name),
                "`] option."
            )]
            pub fn $opt_name(mut self, value: $opt_ty) -> Self {
                self.options().$opt_name = Some(value);
                self
            }
        )*
    };
}
pub(crate) use option_setters;
