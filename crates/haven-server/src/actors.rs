use haven_core::keys::actor_did_key;
use haven_core::{Actor, PdsError, PdsResult, Store};

/// Loads the actor record for `did`, or a `NotFound` if no such repo has
/// ever been provisioned on this store.
pub async fn load_actor<S: Store>(store: &S, did: &str) -> PdsResult<Actor> {
    let bytes = store
        .get(&actor_did_key(did))
        .await?
        .ok_or_else(|| PdsError::NotFound(format!("no such actor: {did}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PdsError::Internal(format!("corrupt actor record for {did}: {e}")))
}
