//! Nondeterministic choices.

use nekara_client::{ClientResult, SessionClient};

const BOUND: u64 = 10;

pub fn run(client: &SessionClient) -> ClientResult<()> {
    let worker = client.spawn(|c| {
        for _ in 0..3 {
            let value = c.create_nondet_integer(BOUND)?;
            c.assert(value < BOUND, "nondeterministic integer out of range")?;
            c.context_switch()?;
        }
        Ok(())
    })?;

    if client.create_nondet_bool()? {
        client.context_switch()?;
    }
    worker.wait()
}
