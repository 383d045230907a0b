//! Cart state container.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::future::join_all;
use thehub_core::{
    AddressId, AuthStatus, Cart, CartId, CartItem, CartItemId, Price, Product, ProductId,
    Quantity, UserId,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::CartError;
use super::single_flight::SingleFlight;
use super::storage::CartIdStore;
use crate::backend::{BackendError, CartBackend, NewCartItem, OrderRecord, OrderRequest};

/// Minimum spacing between two handled authentication transitions.
pub const DEFAULT_AUTH_THROTTLE: Duration = Duration::from_millis(800);

// =============================================================================
// CartState
// =============================================================================

/// Snapshot of the cart as last fetched from the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    /// Canonical cart contents.
    pub cart: Cart,
    /// Last non-fatal error, cleared by the next successful fetch.
    pub last_error: Option<CartError>,
    pending_reads: u32,
    pending_writes: u32,
}

impl CartState {
    /// Whether a fetch or provisioning call is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending_reads > 0
    }

    /// Whether a write call is in flight.
    #[must_use]
    pub const fn is_mutating(&self) -> bool {
        self.pending_writes > 0
    }

    /// Sum of line subtotals, recomputed from the current lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.cart.total_price()
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.cart.total_items()
    }

    /// Current lines.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.cart.items
    }

    /// ID of the verified cart, if any.
    #[must_use]
    pub const fn cart_id(&self) -> Option<&CartId> {
        self.cart.id.as_ref()
    }

    const fn counter_mut(&mut self, activity: Activity) -> &mut u32 {
        match activity {
            Activity::Read => &mut self.pending_reads,
            Activity::Write => &mut self.pending_writes,
        }
    }
}

impl From<Cart> for CartState {
    fn from(cart: Cart) -> Self {
        Self {
            cart,
            ..Self::default()
        }
    }
}

/// Details attached to an order at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    /// Ordering user; defaults to the cart owner.
    pub user_id: Option<UserId>,
    /// Shipping address.
    pub address_id: Option<AddressId>,
    /// Payment method label (e.g. `card`, `pix`).
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Activity {
    Read,
    Write,
}

/// Marks an operation as pending for as long as it is alive.
struct ActivityGuard<'a> {
    state: &'a watch::Sender<CartState>,
    activity: Activity,
}

impl<'a> ActivityGuard<'a> {
    fn start(state: &'a watch::Sender<CartState>, activity: Activity) -> Self {
        state.send_modify(|s| *s.counter_mut(activity) += 1);
        Self { state, activity }
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        let activity = self.activity;
        self.state.send_modify(|s| {
            let counter = s.counter_mut(activity);
            *counter = counter.saturating_sub(1);
        });
    }
}

// =============================================================================
// Authentication tracking
// =============================================================================

#[derive(Debug)]
struct AuthTracker {
    last_settled: Option<AuthStatus>,
    last_handled: Option<Instant>,
    throttle: Duration,
}

impl AuthTracker {
    const fn new(throttle: Duration) -> Self {
        Self {
            last_settled: None,
            last_handled: None,
            throttle,
        }
    }

    /// Record `status` and report whether the cart must be replaced.
    ///
    /// The first settled status only establishes the baseline. A transition
    /// dropped by the throttle is not recorded, so the next observation of
    /// the same status after the window is handled.
    fn observe(&mut self, status: AuthStatus, now: Instant) -> bool {
        if !status.is_settled() {
            return false;
        }
        let Some(previous) = self.last_settled else {
            self.last_settled = Some(status);
            return false;
        };
        if previous == status {
            return false;
        }
        if self
            .last_handled
            .is_some_and(|at| now.saturating_duration_since(at) < self.throttle)
        {
            return false;
        }
        self.last_settled = Some(status);
        self.last_handled = Some(now);
        true
    }
}

// =============================================================================
// CartStore
// =============================================================================

/// Authoritative local view of the shopper's cart.
///
/// Every write goes straight to the backend and is followed by a full
/// re-fetch; local lines are never patched. Concurrent refreshes of the same
/// cart share one fetch and concurrent ensures share one provisioning call.
///
/// Cheap to clone; clones share state.
pub struct CartStore<B> {
    inner: Arc<CartStoreInner<B>>,
}

struct CartStoreInner<B> {
    backend: B,
    storage: Arc<dyn CartIdStore>,
    state: watch::Sender<CartState>,
    refreshes: SingleFlight<CartId, Result<CartState, CartError>>,
    ensures: SingleFlight<(), Result<CartId, CartError>>,
    auth: Mutex<AuthTracker>,
}

impl<B> Clone for CartStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CartBackend> CartStore<B> {
    /// Create a store over `backend`, persisting the cart id in `storage`.
    ///
    /// Nothing is fetched until the first operation; call
    /// [`CartStore::initialize`] to bootstrap eagerly.
    pub fn new(backend: B, storage: Arc<dyn CartIdStore>) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartStoreInner {
                backend,
                storage,
                state,
                refreshes: SingleFlight::new(),
                ensures: SingleFlight::new(),
                auth: Mutex::new(AuthTracker::new(DEFAULT_AUTH_THROTTLE)),
            }),
        }
    }

    /// Override the spacing between handled authentication transitions.
    #[must_use]
    pub fn with_auth_throttle(self, throttle: Duration) -> Self {
        self.auth_tracker().throttle = throttle;
        self
    }

    /// Backend this store talks to.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// ID of the current cart: the verified one, else the persisted one.
    #[must_use]
    pub fn current_cart_id(&self) -> Option<CartId> {
        self.verified_cart_id().or_else(|| self.load_stored_id())
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Return the ID of a cart known to exist on the backend.
    ///
    /// A persisted id is verified with a fetch; if the backend no longer
    /// knows it, a new cart is provisioned and persisted in its place.
    ///
    /// # Errors
    ///
    /// Returns an error if verification fails for a reason other than
    /// not-found, or if provisioning fails.
    #[instrument(skip(self))]
    pub async fn ensure_cart(&self) -> Result<CartId, CartError> {
        if let Some(cart_id) = self.verified_cart_id() {
            return Ok(cart_id);
        }
        self.inner.ensures.run((), || self.ensure_uncoalesced()).await
    }

    async fn ensure_uncoalesced(&self) -> Result<CartId, CartError> {
        // A flight that resolved just before this one started may have done the work
        if let Some(cart_id) = self.verified_cart_id() {
            return Ok(cart_id);
        }

        if let Some(stored) = self.load_stored_id() {
            match self.refresh(Some(&stored)).await {
                Ok(_) => return Ok(stored),
                Err(err) if err.is_not_found() => {
                    debug!(cart_id = %stored, "Stored cart is gone, provisioning a new one");
                }
                Err(err) => return Err(err),
            }
        }

        let provisioned = {
            let _loading = self.activity(Activity::Read);
            self.inner.backend.create_cart().await
        };
        let provisioned = provisioned.map_err(|err| self.fail_backend(err))?;

        let cart_id = provisioned.id.clone();
        self.save_stored_id(&cart_id);
        self.inner.state.send_modify(|s| {
            s.cart = provisioned.into();
            s.last_error = None;
        });
        info!(cart_id = %cart_id, "Provisioned cart");
        Ok(cart_id)
    }

    /// Replace the local lines with the backend's canonical ones.
    ///
    /// Uses `cart_id`, else the current cart. With no cart at all this
    /// returns the current state without touching the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails. A not-found response also clears
    /// the persisted id and resets the local cart.
    #[instrument(skip(self))]
    pub async fn refresh(&self, cart_id: Option<&CartId>) -> Result<CartState, CartError> {
        let Some(cart_id) = cart_id.cloned().or_else(|| self.current_cart_id()) else {
            debug!("No cart to refresh");
            return Ok(self.state());
        };
        self.inner
            .refreshes
            .run(cart_id.clone(), || self.fetch_and_apply(cart_id))
            .await
    }

    async fn fetch_and_apply(&self, cart_id: CartId) -> Result<CartState, CartError> {
        let fetched = {
            let _loading = self.activity(Activity::Read);
            self.inner.backend.fetch_cart(&cart_id).await
        };

        match fetched {
            Ok(cart) => {
                self.inner.state.send_modify(|s| {
                    s.cart = cart;
                    s.last_error = None;
                });
                Ok(self.state())
            }
            Err(err) => {
                if err.is_not_found() {
                    warn!(cart_id = %cart_id, "Cart no longer exists on the backend, resetting");
                    self.reset_local();
                }
                Err(self.fail_backend(err))
            }
        }
    }

    /// Bootstrap: refresh the persisted cart, or provision one.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching or provisioning fails.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<CartState, CartError> {
        if let Some(stored) = self.load_stored_id() {
            match self.refresh(Some(&stored)).await {
                Err(err) if err.is_not_found() => {}
                result => return result,
            }
        }
        let cart_id = self.ensure_cart().await?;
        self.refresh(Some(&cart_id)).await
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Add `quantity` units of a product, provisioning the cart if needed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive quantity or blank
    /// product id before any network call, or the backend error.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartState, CartError> {
        let quantity = Quantity::new(quantity)?;
        if product_id.is_blank() {
            return Err(CartError::MissingProductId);
        }

        let written = {
            let _mutating = self.activity(Activity::Write);
            let item = NewCartItem {
                cart_id: self.ensure_cart().await?,
                product_id: product_id.clone(),
                quantity,
            };
            self.inner.backend.create_item(&item).await.map(drop)
        };
        self.refresh_after(written).await
    }

    /// Add `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// See [`CartStore::add_item`].
    pub async fn add_product(
        &self,
        product: &Product,
        quantity: i64,
    ) -> Result<CartState, CartError> {
        self.add_item(&product.id, quantity).await
    }

    /// Set the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive quantity or blank item
    /// id before any network call, or the backend error.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        item_id: &CartItemId,
        quantity: i64,
    ) -> Result<CartState, CartError> {
        let quantity = Quantity::new(quantity)?;
        if item_id.is_blank() {
            return Err(CartError::MissingItemId);
        }
        self.set_quantity(item_id, quantity).await
    }

    async fn set_quantity(
        &self,
        item_id: &CartItemId,
        quantity: Quantity,
    ) -> Result<CartState, CartError> {
        let written = {
            let _mutating = self.activity(Activity::Write);
            self.inner
                .backend
                .update_item_quantity(item_id, quantity)
                .await
                .map(drop)
        };
        self.refresh_after(written).await
    }

    /// Remove a line. A blank id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the delete or the re-fetch fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: &CartItemId) -> Result<CartState, CartError> {
        if item_id.is_blank() {
            return Ok(self.state());
        }
        let written = {
            let _mutating = self.activity(Activity::Write);
            self.inner.backend.delete_item(item_id).await
        };
        self.refresh_after(written).await
    }

    /// Add one unit to a line. Unknown lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the update or the re-fetch fails.
    #[instrument(skip(self))]
    pub async fn increment_item(&self, item_id: &CartItemId) -> Result<CartState, CartError> {
        let Some(quantity) = self.local_quantity(item_id) else {
            return Ok(self.state());
        };
        self.set_quantity(item_id, quantity.incremented()).await
    }

    /// Remove one unit from a line, removing the line at zero. Unknown lines
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the write or the re-fetch fails.
    #[instrument(skip(self))]
    pub async fn decrement_item(&self, item_id: &CartItemId) -> Result<CartState, CartError> {
        let Some(quantity) = self.local_quantity(item_id) else {
            return Ok(self.state());
        };
        match quantity.decremented() {
            Some(quantity) => self.set_quantity(item_id, quantity).await,
            None => self.remove_item(item_id).await,
        }
    }

    /// Delete every line of the cart.
    ///
    /// Deletes are issued concurrently and the cart is always re-fetched
    /// afterwards, so the state shows what was actually removed. Nothing is
    /// rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::PartialClear`] if any delete failed, or the error
    /// of the ensure or fetch calls.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<CartState, CartError> {
        let cart_id = self.ensure_cart().await?;
        let current = self.refresh(Some(&cart_id)).await?;
        let item_ids: Vec<CartItemId> = current.items().iter().map(|i| i.id.clone()).collect();
        if item_ids.is_empty() {
            return Ok(current);
        }

        let results = {
            let _mutating = self.activity(Activity::Write);
            join_all(item_ids.iter().map(|id| self.inner.backend.delete_item(id))).await
        };
        let failures: Vec<BackendError> = results.into_iter().filter_map(Result::err).collect();

        let refreshed = self.refresh(Some(&cart_id)).await;

        let Some(first) = failures.first() else {
            return refreshed;
        };
        warn!(
            cart_id = %cart_id,
            failed = failures.len(),
            attempted = item_ids.len(),
            "Cart cleared partially"
        );
        Err(self.fail(CartError::PartialClear {
            failed: failures.len(),
            attempted: item_ids.len(),
            source: first.clone(),
        }))
    }

    /// Turn the current cart into an order.
    ///
    /// On success the persisted id is cleared and the local cart reset; on
    /// failure both are kept so the checkout can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoActiveCart`] without a current cart, or the
    /// backend error.
    #[instrument(skip(self, draft))]
    pub async fn checkout(&self, draft: OrderDraft) -> Result<OrderRecord, CartError> {
        let cart_id = self.current_cart_id().ok_or(CartError::NoActiveCart)?;
        if self.verified_cart_id().as_ref() != Some(&cart_id) {
            self.refresh(Some(&cart_id)).await?;
        }

        let mut request = OrderRequest::for_cart(cart_id.clone(), &self.inner.state.borrow().cart);
        request.user_id = draft.user_id.or(request.user_id);
        request.address_id = draft.address_id;
        request.payment_method = draft.payment_method;

        let created = {
            let _mutating = self.activity(Activity::Write);
            self.inner.backend.create_order(&request).await
        };
        let order = created.map_err(|err| self.fail_backend(err))?;

        info!(
            cart_id = %cart_id,
            order_id = ?order.id,
            total = ?request.total_amount,
            "Order created"
        );
        self.reset_local();
        Ok(order)
    }

    // -------------------------------------------------------------------------
    // Session changes
    // -------------------------------------------------------------------------

    /// React to an authentication status change.
    ///
    /// Only a transition between authenticated and anonymous replaces the
    /// cart: intermediate states and repeats are ignored, as are transitions
    /// arriving within the throttle window of the previous handled one.
    ///
    /// # Errors
    ///
    /// Returns an error if provisioning or fetching the new cart fails.
    #[instrument(skip(self))]
    pub async fn handle_auth_change(&self, status: AuthStatus) -> Result<CartState, CartError> {
        let react = self.auth_tracker().observe(status, Instant::now());
        if !react {
            return Ok(self.state());
        }

        info!(?status, "Authentication changed, starting a new cart");
        self.reset_local();
        let cart_id = self.ensure_cart().await?;
        self.refresh(Some(&cart_id)).await
    }

    /// Drop the local cart after the backend rejected the session.
    ///
    /// Called for every unauthorized backend response; embedders may also
    /// call it when their own session layer sees a rejection.
    #[instrument(skip(self))]
    pub fn handle_unauthorized(&self) {
        warn!("Session rejected, discarding local cart");
        self.reset_local();
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Record a write failure, or re-fetch the cart after a successful write.
    ///
    /// The re-fetch joins a fetch of the same cart that is already in flight.
    /// If that fetch started before the write landed, the returned state may
    /// not include this write yet; the next refresh will.
    async fn refresh_after(&self, written: Result<(), BackendError>) -> Result<CartState, CartError> {
        written.map_err(|err| self.fail_backend(err))?;
        self.refresh(None).await
    }

    fn activity(&self, activity: Activity) -> ActivityGuard<'_> {
        ActivityGuard::start(&self.inner.state, activity)
    }

    fn fail(&self, err: CartError) -> CartError {
        self.inner
            .state
            .send_modify(|s| s.last_error = Some(err.clone()));
        err
    }

    /// Record a backend failure, dropping the local cart if the session was
    /// rejected.
    fn fail_backend(&self, err: BackendError) -> CartError {
        if err.is_unauthorized() {
            self.handle_unauthorized();
        }
        self.fail(err.into())
    }

    fn reset_local(&self) {
        self.clear_stored_id();
        self.inner.state.send_modify(|s| s.cart = Cart::default());
    }

    fn verified_cart_id(&self) -> Option<CartId> {
        self.inner.state.borrow().cart.id.clone()
    }

    fn local_quantity(&self, item_id: &CartItemId) -> Option<Quantity> {
        self.inner
            .state
            .borrow()
            .cart
            .find_item(item_id)
            .map(|item| item.quantity)
    }

    fn auth_tracker(&self) -> std::sync::MutexGuard<'_, AuthTracker> {
        self.inner.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_stored_id(&self) -> Option<CartId> {
        match self.inner.storage.load() {
            Ok(cart_id) => cart_id.filter(|id| !id.is_blank()),
            Err(e) => {
                warn!(error = %e, "Failed to load stored cart id");
                None
            }
        }
    }

    fn save_stored_id(&self, cart_id: &CartId) {
        if let Err(e) = self.inner.storage.save(cart_id) {
            warn!(error = %e, cart_id = %cart_id, "Failed to persist cart id");
        }
    }

    fn clear_stored_id(&self) {
        if let Err(e) = self.inner.storage.clear() {
            warn!(error = %e, "Failed to clear stored cart id");
        }
    }
}
