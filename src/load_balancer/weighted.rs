//! Weighted round robin, accumulation form.
//!
//! Each round, every alive backend's `current_weight` grows by its static
//! weight. The largest `current_weight` wins (first in pool order on a tie)
//! and is charged the sum of the alive weights. Over many rounds each
//! backend is picked in proportion to its weight.
//!
//! `current_weight` is never reset: a backend that goes down keeps whatever
//! credit or debt it had and resumes from there when it comes back.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Weighted round-robin selector. Stateless; the state lives in each backend.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin;

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        let alive: Vec<&Arc<Backend>> = backends.iter().filter(|b| b.is_alive()).collect();
        if alive.is_empty() {
            return None;
        }

        let mut total_weight = 0;
        let mut selected: Option<(&Arc<Backend>, i64)> = None;
        for backend in alive {
            let current = backend.credit();
            total_weight += backend.weight();
            match selected {
                Some((_, best)) if current <= best => {}
                _ => selected = Some((backend, current)),
            }
        }

        let (backend, _) = selected?;
        backend.debit(total_weight);
        Some(Arc::clone(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::Transport;
    use std::time::Duration;

    fn backend(port: u16, weight: u32) -> Arc<Backend> {
        let transport = Transport::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
        Arc::new(Backend::new(format!("b{}", port), transport, weight, Duration::from_secs(2)))
    }

    fn count(lb: &WeightedRoundRobin, backends: &[Arc<Backend>], rounds: usize) -> Vec<usize> {
        let mut hits = vec![0; backends.len()];
        for _ in 0..rounds {
            let chosen = lb.next_server(backends).unwrap();
            let idx = backends.iter().position(|b| Arc::ptr_eq(b, &chosen)).unwrap();
            hits[idx] += 1;
        }
        hits
    }

    #[test]
    fn distributes_by_weight() {
        let lb = WeightedRoundRobin::new();
        let backends = vec![backend(1, 3), backend(2, 1)];
        assert_eq!(count(&lb, &backends, 4000), vec![3000, 1000]);

        let backends = vec![backend(1, 5), backend(2, 1), backend(3, 1)];
        assert_eq!(count(&lb, &backends, 700), vec![500, 100, 100]);
    }

    #[test]
    fn ties_go_to_the_first_backend() {
        let lb = WeightedRoundRobin::new();
        let backends = vec![backend(1, 1), backend(2, 1), backend(3, 1)];
        let first = lb.next_server(&backends).unwrap();
        assert!(Arc::ptr_eq(&first, &backends[0]));

        let second = lb.next_server(&backends).unwrap();
        assert!(Arc::ptr_eq(&second, &backends[1]));
    }

    #[test]
    fn no_alive_backends() {
        let lb = WeightedRoundRobin::new();
        let backends = vec![backend(1, 1), backend(2, 2)];
        for b in &backends {
            b.set_alive(false);
        }
        assert!(lb.next_server(&backends).is_none());
        assert!(lb.next_server(&[]).is_none());
        // No scheduling state moves when nothing is selectable.
        assert_eq!(backends[0].current_weight(), 1);
        assert_eq!(backends[1].current_weight(), 2);
    }

    #[test]
    fn dead_backends_are_skipped() {
        let lb = WeightedRoundRobin::new();
        let backends = vec![backend(1, 3), backend(2, 1)];
        backends[0].set_alive(false);
        assert_eq!(count(&lb, &backends, 50), vec![0, 50]);
    }

    #[test]
    fn credit_survives_an_outage() {
        let lb = WeightedRoundRobin::new();
        let a = backend(1, 1);
        let b = backend(2, 2);
        let backends = vec![a.clone(), b.clone()];

        // a=2, b=4 → b wins and drops to 1.
        assert!(Arc::ptr_eq(&lb.next_server(&backends).unwrap(), &b));
        assert_eq!(a.current_weight(), 2);

        a.set_alive(false);
        for _ in 0..5 {
            assert!(Arc::ptr_eq(&lb.next_server(&backends).unwrap(), &b));
        }
        assert_eq!(a.current_weight(), 2);

        // a=3, b=3 → a wins the tie with the credit it kept.
        a.set_alive(true);
        assert!(Arc::ptr_eq(&lb.next_server(&backends).unwrap(), &a));
    }

    #[test]
    fn lone_survivor_is_selected_even_in_debt() {
        let lb = WeightedRoundRobin::new();
        let small = backend(1, 1);
        let backends = vec![small.clone(), backend(2, 5), backend(3, 5)];

        // The first pick of `small` charges it 11 and leaves it at -3.
        while !Arc::ptr_eq(&lb.next_server(&backends).unwrap(), &small) {}
        assert_eq!(small.current_weight(), -3);

        backends[1].set_alive(false);
        backends[2].set_alive(false);
        for _ in 0..3 {
            assert!(Arc::ptr_eq(&lb.next_server(&backends).unwrap(), &small));
        }
    }
}
