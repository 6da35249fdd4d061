//! The [`TableEvents`] facade: live row-change feeds for one table.
//!
//! Each listener targets one change kind (create, update, delete and their
//! bulk variants), optionally narrowed by a where-clause evaluated
//! gateway-side. Listeners sharing a kind and normalized where-clause share
//! one wire subscription.

use crate::connection::{EngineCmd, EngineHandle};
use crate::error::Result;
use crate::models::{ErrorDetail, SubscriptionKind};
use crate::subscription::{ErrorCallback, EventCallback, Fingerprint, ListenerHandle, ListenerRecord};
use crate::validation;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Handle to the realtime change feeds of one table.
///
/// Obtained from [`PylonLinkClient::table`](crate::PylonLinkClient::table).
pub struct TableEvents {
    name: String,
    engine: Arc<EngineHandle>,
}

macro_rules! data_listener_methods {
    ($(#[$doc:meta])* $add:ident, $add_err:ident, $remove:ident, $kind:expr) => {
        $(#[$doc])*
        pub fn $add(
            &self,
            where_clause: Option<&str>,
            callback: impl Fn(JsonValue) + Send + Sync + 'static,
        ) -> Result<ListenerHandle> {
            self.add_listener($kind, where_clause, Arc::new(callback), None)
        }

        /// Same, with an error callback fired if the gateway rejects the
        /// subscription (e.g. a malformed where-clause).
        pub fn $add_err(
            &self,
            where_clause: Option<&str>,
            callback: impl Fn(JsonValue) + Send + Sync + 'static,
            on_error: impl Fn(ErrorDetail) + Send + Sync + 'static,
        ) -> Result<ListenerHandle> {
            self.add_listener($kind, where_clause, Arc::new(callback), Some(Arc::new(on_error)))
        }

        /// Remove every listener of this kind registered under `where_clause`.
        pub fn $remove(&self, where_clause: Option<&str>) -> Result<()> {
            self.remove_listeners($kind, where_clause)
        }
    };
}

impl TableEvents {
    pub(crate) fn new(engine: Arc<EngineHandle>, name: String) -> Self {
        Self { name, engine }
    }

    /// Table name, optionally namespace-qualified.
    pub fn name(&self) -> &str {
        &self.name
    }

    data_listener_methods!(
        /// Listen for rows inserted into this table.
        add_create_listener,
        add_create_listener_with_error,
        remove_create_listeners,
        SubscriptionKind::Create
    );

    data_listener_methods!(
        /// Listen for rows updated in this table.
        add_update_listener,
        add_update_listener_with_error,
        remove_update_listeners,
        SubscriptionKind::Update
    );

    data_listener_methods!(
        /// Listen for rows deleted from this table.
        add_delete_listener,
        add_delete_listener_with_error,
        remove_delete_listeners,
        SubscriptionKind::Delete
    );

    data_listener_methods!(
        /// Listen for bulk inserts into this table.
        add_bulk_create_listener,
        add_bulk_create_listener_with_error,
        remove_bulk_create_listeners,
        SubscriptionKind::BulkCreate
    );

    data_listener_methods!(
        /// Listen for bulk updates of this table.
        add_bulk_update_listener,
        add_bulk_update_listener_with_error,
        remove_bulk_update_listeners,
        SubscriptionKind::BulkUpdate
    );

    data_listener_methods!(
        /// Listen for bulk deletes from this table.
        add_bulk_delete_listener,
        add_bulk_delete_listener_with_error,
        remove_bulk_delete_listeners,
        SubscriptionKind::BulkDelete
    );

    /// Remove exactly the listener the handle was returned for.
    pub fn remove_listener(&self, handle: &ListenerHandle) -> Result<()> {
        self.engine.enqueue(EngineCmd::Release {
            fingerprint: handle.fingerprint.clone(),
            listener_id: handle.listener_id,
        })
    }

    /// Remove every change listener on this table, across all kinds and
    /// where-clauses.
    pub fn remove_all_listeners(&self) -> Result<()> {
        self.engine.enqueue(EngineCmd::ReleaseMatching {
            target: self.name.clone(),
            kinds: SubscriptionKind::DATA_KINDS.to_vec(),
        })
    }

    fn add_listener(
        &self,
        kind: SubscriptionKind,
        where_clause: Option<&str>,
        callback: EventCallback,
        on_error: Option<ErrorCallback>,
    ) -> Result<ListenerHandle> {
        validation::filter(where_clause, "Where clause")?;
        let fingerprint = Fingerprint::new(kind, &self.name, where_clause);
        let listener_id = self.engine.next_listener_id();
        self.engine.enqueue(EngineCmd::Acquire {
            fingerprint: fingerprint.clone(),
            listener: ListenerRecord {
                id: listener_id,
                callback,
                on_error,
                ready_flag: None,
            },
        })?;
        Ok(ListenerHandle {
            fingerprint,
            listener_id,
        })
    }

    fn remove_listeners(&self, kind: SubscriptionKind, where_clause: Option<&str>) -> Result<()> {
        self.engine.enqueue(EngineCmd::ReleaseFingerprint {
            fingerprint: Fingerprint::new(kind, &self.name, where_clause),
        })
    }
}

impl std::fmt::Debug for TableEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableEvents")
            .field("name", &self.name)
            .finish()
    }
}
