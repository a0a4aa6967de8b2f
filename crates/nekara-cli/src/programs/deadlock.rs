//! Lock-order inversion.

use nekara_client::{ClientResult, ControlledLock, SessionClient};

pub fn run(client: &SessionClient) -> ClientResult<()> {
    let a = ControlledLock::new(client)?;
    let b = ControlledLock::new(client)?;

    let forward = {
        let (a, b) = (a.clone(), b.clone());
        client.spawn(move |c| {
            a.acquire()?;
            b.acquire()?;
            c.context_switch()?;
            b.release()?;
            a.release()
        })?
    };
    let backward = client.spawn(move |c| {
        b.acquire()?;
        a.acquire()?;
        c.context_switch()?;
        a.release()?;
        b.release()
    })?;

    forward.wait()?;
    backward.wait()
}
