use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::catalog::parser::parse_and_validate;
use crate::catalog::CatalogStore;
use crate::domain::cart::{Cart, CartLine, MAX_LINE_QUANTITY};
use crate::domain::product::ItemKey;
use crate::domain::session::SessionId;
use crate::errors::OrderError;

#[derive(Default)]
struct SessionSlot {
    mutation: Arc<AsyncMutex<()>>,
    cart: RwLock<Cart>,
}

impl SessionSlot {
    fn read(&self) -> Cart {
        match self.cart.read() {
            Ok(cart) => cart.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write<R>(&self, apply: impl FnOnce(&mut Cart) -> R) -> R {
        match self.cart.write() {
            Ok(mut cart) => apply(&mut cart),
            Err(poisoned) => apply(&mut poisoned.into_inner()),
        }
    }
}

/// Exclusive mutation scope for one session's cart. Dropping the guard
/// releases the session.
pub struct SessionGuard {
    session_id: SessionId,
    slot: Arc<SessionSlot>,
    _permit: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn snapshot(&self) -> Cart {
        self.slot.read()
    }

    /// Applies a mutation; readers see the cart before or after it, never
    /// in between.
    pub fn apply<R>(&self, mutation: impl FnOnce(&mut Cart) -> R) -> R {
        self.slot.write(mutation)
    }

    pub fn clear(&self) {
        self.slot.write(Cart::clear);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AddConfirmation {
    pub base: String,
    pub modifiers: Vec<String>,
    pub quantity: u32,
}

impl AddConfirmation {
    pub fn message(&self) -> String {
        let mut message = format!("Added {} {}", self.quantity, self.base);
        if !self.modifiers.is_empty() {
            message.push_str(" with ");
            message.push_str(&self.modifiers.join(", "));
        }
        message.push('.');
        message
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed { display_name: String },
    NotInCart { display_name: String },
}

impl RemoveOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Removed { display_name } => format!("Removed {display_name} from cart."),
            Self::NotInCart { display_name } => format!("{display_name} not found in cart."),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            return "Your cart is empty.".to_string();
        }
        self.lines
            .iter()
            .map(|line| format!("{}x {}", line.quantity, line.display_name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Per-session carts.
///
/// Mutations on one session are serialized by an async mutex; reads copy
/// the cart under a short read lock and never wait on an in-flight
/// mutation scope.
pub struct CartStore {
    catalog: Arc<CatalogStore>,
    sessions: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
}

impl CartStore {
    pub fn new(catalog: Arc<CatalogStore>) -> Self {
        Self { catalog, sessions: Mutex::new(HashMap::new()) }
    }

    /// Waits for, then holds, the session's mutation scope. Creates the
    /// session's cart on first use.
    pub async fn lock_session(&self, session_id: &SessionId) -> SessionGuard {
        let slot = self.slot_or_create(session_id);
        let permit = slot.mutation.clone().lock_owned().await;
        SessionGuard { session_id: session_id.clone(), slot, _permit: permit }
    }

    pub async fn add(
        &self,
        session_id: &SessionId,
        raw_phrase: &str,
        quantity: i64,
    ) -> Result<AddConfirmation, OrderError> {
        let quantity = validate_quantity(quantity)?;
        let index = self.catalog.snapshot()?;
        let parsed = parse_and_validate(&index, raw_phrase)?;

        let mut increments: Vec<(ItemKey, String, u32)> = Vec::new();
        for item in parsed.items() {
            match increments.iter_mut().find(|(key, _, _)| key == &item.key) {
                Some((_, _, amount)) => *amount = amount.saturating_add(quantity),
                None => increments.push((item.key.clone(), item.name.clone(), quantity)),
            }
        }

        let guard = self.lock_session(session_id).await;
        let cart = guard.snapshot();
        for (key, name, amount) in &increments {
            if cart.quantity_after_add(key, *amount).is_none() {
                return Err(OrderError::InvalidQuantity {
                    quantity: i64::from(quantity),
                    reason: format!(
                        "{name} would exceed {MAX_LINE_QUANTITY} (currently {})",
                        cart.quantity_of(key)
                    ),
                });
            }
        }

        guard.apply(|cart| {
            for (key, name, amount) in &increments {
                cart.add(key, name, *amount);
            }
        });
        debug!(
            event_name = "cart.items_added",
            session_id = %session_id,
            base = %parsed.base.key,
            modifiers = parsed.modifiers.len(),
            quantity,
            "cart updated"
        );

        Ok(AddConfirmation {
            base: parsed.base.name.clone(),
            modifiers: parsed.modifiers.iter().map(|item| item.name.clone()).collect(),
            quantity,
        })
    }

    pub async fn remove(
        &self,
        session_id: &SessionId,
        item_name: &str,
    ) -> Result<RemoveOutcome, OrderError> {
        let index = self.catalog.snapshot()?;
        let item = index
            .lookup(item_name)
            .ok_or_else(|| OrderError::UnknownItem { name: item_name.trim().to_string() })?;

        let guard = self.lock_session(session_id).await;
        let removed = guard.apply(|cart| cart.remove(&item.key));
        debug!(
            event_name = "cart.item_removed",
            session_id = %session_id,
            item = %item.key,
            removed,
            "cart updated"
        );

        let display_name = item.name.clone();
        Ok(if removed {
            RemoveOutcome::Removed { display_name }
        } else {
            RemoveOutcome::NotInCart { display_name }
        })
    }

    pub fn view(&self, session_id: &SessionId) -> CartView {
        CartView { lines: self.snapshot(session_id).lines().to_vec() }
    }

    /// Atomic copy of the session's cart; empty for unknown sessions.
    pub fn snapshot(&self, session_id: &SessionId) -> Cart {
        self.slot(session_id).map(|slot| slot.read()).unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        match self.sessions.lock() {
            Ok(sessions) => sessions.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn slot(&self, session_id: &SessionId) -> Option<Arc<SessionSlot>> {
        match self.sessions.lock() {
            Ok(sessions) => sessions.get(session_id).cloned(),
            Err(poisoned) => poisoned.into_inner().get(session_id).cloned(),
        }
    }

    fn slot_or_create(&self, session_id: &SessionId) -> Arc<SessionSlot> {
        let mut sessions = match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.entry(session_id.clone()).or_default().clone()
    }
}

fn validate_quantity(quantity: i64) -> Result<u32, OrderError> {
    if quantity <= 0 {
        return Err(OrderError::InvalidQuantity {
            quantity,
            reason: "quantity must be at least 1".to_string(),
        });
    }
    u32::try_from(quantity).ok().filter(|value| *value <= MAX_LINE_QUANTITY).ok_or_else(|| {
        OrderError::InvalidQuantity {
            quantity,
            reason: format!("quantity must not exceed {MAX_LINE_QUANTITY}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CartStore, RemoveOutcome};
    use crate::catalog::fixtures;
    use crate::catalog::source::StaticCatalogSource;
    use crate::catalog::CatalogStore;
    use crate::domain::cart::MAX_LINE_QUANTITY;
    use crate::domain::product::ItemKey;
    use crate::domain::session::SessionId;
    use crate::errors::OrderError;

    fn store() -> CartStore {
        let catalog = CatalogStore::new(Arc::new(StaticCatalogSource::new(fixtures::records())));
        CartStore::new(Arc::new(catalog))
    }

    #[tokio::test]
    async fn pizza_with_modifiers_adds_independent_lines() {
        let store = store();
        let session = SessionId::new("s-1");

        let confirmation = store
            .add(&session, "Margherita with Extra Cheese and Jalapeno", 2)
            .await
            .expect("valid phrase");

        assert_eq!(confirmation.message(), "Added 2 Margherita with Extra Cheese, Jalapeno.");
        let view = store.view(&session);
        let lines: Vec<_> =
            view.lines.iter().map(|line| (line.display_name.as_str(), line.quantity)).collect();
        assert_eq!(lines, vec![("Margherita", 2), ("Extra Cheese", 2), ("Jalapeno", 2)]);
    }

    #[tokio::test]
    async fn quantities_accumulate_across_adds() {
        let store = store();
        let session = SessionId::new("s-1");
        store.add(&session, "farmhouse", 1).await.expect("first add");
        store.add(&session, "FARMHOUSE", 3).await.expect("second add");

        assert_eq!(store.snapshot(&session).quantity_of(&ItemKey::normalize("Farmhouse")), 4);
    }

    #[tokio::test]
    async fn invalid_modifier_leaves_cart_untouched() {
        let store = store();
        let session = SessionId::new("s-1");
        store.add(&session, "farmhouse", 1).await.expect("seed cart");

        let error = store.add(&session, "Margherita with Coke", 1).await.expect_err("coke");
        assert!(matches!(error, OrderError::InvalidModifier { .. }));
        assert_eq!(store.view(&session).render(), "1x Farmhouse");
    }

    #[tokio::test]
    async fn non_positive_and_oversized_quantities_are_rejected() {
        let store = store();
        let session = SessionId::new("s-1");

        for quantity in [0, -3, i64::from(MAX_LINE_QUANTITY) + 1] {
            let error =
                store.add(&session, "margherita", quantity).await.expect_err("bad quantity");
            assert!(matches!(error, OrderError::InvalidQuantity { .. }));
        }
        assert!(store.view(&session).is_empty());
    }

    #[tokio::test]
    async fn line_limit_is_checked_before_any_line_changes() {
        let store = store();
        let session = SessionId::new("s-1");
        store.add(&session, "margherita", 10).await.expect("seed");
        store
            .add(&session, "farmhouse with extra cheese", i64::from(MAX_LINE_QUANTITY))
            .await
            .expect("fresh lines fit");

        let error = store
            .add(&session, "margherita with jalapeno", i64::from(MAX_LINE_QUANTITY))
            .await
            .expect_err("margherita would overflow");
        assert!(matches!(error, OrderError::InvalidQuantity { .. }));
        assert_eq!(store.snapshot(&session).quantity_of(&ItemKey::normalize("Jalapeno")), 0);
    }

    #[tokio::test]
    async fn remove_distinguishes_unknown_items_from_missing_lines() {
        let store = store();
        let session = SessionId::new("s-1");
        store.add(&session, "margherita", 2).await.expect("seed");

        let removed = store.remove(&session, " MARGHERITA").await.expect("on menu");
        assert_eq!(removed, RemoveOutcome::Removed { display_name: "Margherita".to_string() });

        let missing = store.remove(&session, "margherita").await.expect("still on menu");
        assert_eq!(missing.message(), "Margherita not found in cart.");

        let unknown = store.remove(&session, "calzone").await.expect_err("not on menu");
        assert!(matches!(unknown, OrderError::UnknownItem { .. }));
    }

    #[tokio::test]
    async fn empty_cart_renders_explicit_message() {
        let store = store();
        let view = store.view(&SessionId::new("nobody"));
        assert_eq!(view.render(), "Your cart is empty.");
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_on_one_session_all_land() {
        let store = Arc::new(store());
        let session = SessionId::new("shared");

        let mut handles = Vec::new();
        for phrase in ["margherita", "farmhouse", "pepperoni pizza"] {
            for _ in 0..20 {
                let store = store.clone();
                let session = session.clone();
                handles.push(tokio::spawn(async move { store.add(&session, phrase, 1).await }));
            }
        }
        for handle in handles {
            handle.await.expect("task joins").expect("add succeeds");
        }

        let cart = store.snapshot(&session);
        assert_eq!(cart.lines().len(), 3);
        assert!(cart.lines().iter().all(|line| line.quantity == 20));
    }

    #[tokio::test]
    async fn reads_do_not_wait_for_a_held_session() {
        let store = store();
        let session = SessionId::new("s-1");
        store.add(&session, "margherita", 1).await.expect("seed");

        let guard = store.lock_session(&session).await;
        assert_eq!(store.view(&session).lines.len(), 1);
        guard.clear();
        assert!(store.view(&session).is_empty());
    }
}
