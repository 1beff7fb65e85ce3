//! Session-related types.
//!
//! Cart, wishlist and checkout state live in the server-side session as
//! JSON values, one key each. Handlers load them with [`load`], mutate the
//! owned value and write it back with [`store`].

use serde::{Serialize, de::DeserializeOwned};
use tower_sessions::Session;

/// Session keys for shopper state.
pub mod session_keys {
    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for the wishlist.
    pub const WISHLIST: &str = "wishlist";

    /// Key for the current checkout attempt.
    pub const CHECKOUT: &str = "checkout";
}

/// Read a value from the session, falling back to its default when absent.
///
/// # Errors
///
/// Returns an error if the session store fails or the stored value no
/// longer deserializes.
pub async fn load<T>(session: &Session, key: &str) -> Result<T, tower_sessions::session::Error>
where
    T: DeserializeOwned + Default,
{
    Ok(session.get::<T>(key).await?.unwrap_or_default())
}

/// Write a value to the session.
///
/// # Errors
///
/// Returns an error if the value fails to serialize or the store fails.
pub async fn store<T>(
    session: &Session,
    key: &str,
    value: &T,
) -> Result<(), tower_sessions::session::Error>
where
    T: Serialize + Sync,
{
    session.insert(key, value).await
}
