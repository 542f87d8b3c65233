use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(RestaurantId);
id_newtype!(GroupId);
id_newtype!(CategoryId);
id_newtype!(ItemId);
id_newtype!(UserId);
id_newtype!(OrderId);

/// Bound on a random item pick; the deepest identifier wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomScope {
    Category(CategoryId),
    Group(GroupId),
    Restaurant(RestaurantId),
    /// Any item of any active restaurant. Not produced by navigation,
    /// but the selector still has to mean something for it.
    Any,
}
