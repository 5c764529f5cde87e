// 🧹 Destructive Reset - empties all four tables before a DropAndReplace run
//
// All-or-nothing: one transaction, children cleared before parents, id
// sequences restarted. Any failure rolls back and leaves the store untouched.

use crate::entities::EntityKind;
use crate::error::StoreResult;
use crate::store::RecordStore;

pub fn reset_all(store: &mut dyn RecordStore) -> StoreResult<()> {
    tracing::warn!("dropping all existing address, meter, endpoint and GIS data");

    store.begin()?;
    let cleared = clear_children_first(store).and_then(|()| store.commit());

    if let Err(err) = cleared {
        if let Err(rollback_err) = store.rollback() {
            tracing::error!(error = %rollback_err, "rollback after failed reset also failed");
        }
        tracing::error!(error = %err, "reset failed, store left unchanged");
        return Err(err);
    }

    tracing::info!("all existing data dropped");
    Ok(())
}

fn clear_children_first(store: &mut dyn RecordStore) -> StoreResult<()> {
    store.suspend_integrity()?;
    for kind in EntityKind::CHILDREN_FIRST {
        store.clear_table(kind)?;
        tracing::debug!(table = kind.table(), "table cleared");
    }
    store.restore_integrity()
}
