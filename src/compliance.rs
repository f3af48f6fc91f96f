//! Compliance values (alpha = 1/stiffness) live in an arena owned by the scene
//! rather than behind raw pointers shared with constraints, so constraints hold
//! a plain index instead of a reference with a lifetime to manage.

/// Index into a [`ComplianceArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComplianceHandle(usize);

#[derive(Clone, Debug, Default)]
pub struct ComplianceArena {
    values: Vec<f64>,
}

impl ComplianceArena {
    pub fn new() -> ComplianceArena {
        ComplianceArena { values: Vec::new() }
    }

    pub fn insert(&mut self, alpha: f64) -> ComplianceHandle {
        self.values.push(alpha);
        ComplianceHandle(self.values.len() - 1)
    }

    pub fn get(&self, handle: ComplianceHandle) -> f64 {
        self.values[handle.0]
    }

    pub fn set(&mut self, handle: ComplianceHandle, alpha: f64) {
        self.values[handle.0] = alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_handles() {
        let mut arena = ComplianceArena::new();
        let rigid = arena.insert(0.0);
        let soft = arena.insert(1e-6);
        assert_eq!(arena.get(rigid), 0.0);
        assert_eq!(arena.get(soft), 1e-6);
        arena.set(soft, 2e-6);
        assert_eq!(arena.get(soft), 2e-6);
    }
}
