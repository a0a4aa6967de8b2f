//! Two tasks race on a shared counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nekara_client::{ClientResult, ControlledLock, SessionClient};

pub fn run(client: &SessionClient) -> ClientResult<()> {
    let x = Arc::new(AtomicU64::new(0));
    let lock = ControlledLock::new(client)?;

    let reader = {
        let (x, lock) = (Arc::clone(&x), lock.clone());
        client.spawn(move |c| {
            lock.acquire()?;
            let lx1 = x.load(Ordering::SeqCst);
            c.context_switch()?;
            c.context_switch()?;
            let lx2 = x.load(Ordering::SeqCst);
            c.assert(lx1 == lx2, "Race!")?;
            lock.release()
        })?
    };
    // Writes without taking the lock.
    let writer = client.spawn(move |c| {
        c.context_switch()?;
        x.store(1, Ordering::SeqCst);
        Ok(())
    })?;

    reader.wait()?;
    writer.wait()
}
