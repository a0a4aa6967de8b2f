//! Dining philosophers with ordered forks.

use nekara_client::{ClientResult, ControlledLock, SessionClient};

const SEATS: usize = 3;
const MEALS: usize = 2;

pub fn run(client: &SessionClient) -> ClientResult<()> {
    let forks = (0..SEATS)
        .map(|_| ControlledLock::new(client))
        .collect::<ClientResult<Vec<_>>>()?;

    let mut diners = Vec::with_capacity(SEATS);
    for seat in 0..SEATS {
        let neighbour = (seat + 1) % SEATS;
        // Lower-numbered fork first, so no cycle of waiters can form.
        let first = forks[seat.min(neighbour)].clone();
        let second = forks[seat.max(neighbour)].clone();
        diners.push(client.spawn(move |c| {
            for _ in 0..MEALS {
                first.acquire()?;
                second.acquire()?;
                c.context_switch()?;
                second.release()?;
                first.release()?;
            }
            Ok(())
        })?);
    }

    for diner in diners {
        diner.wait()?;
    }
    Ok(())
}
