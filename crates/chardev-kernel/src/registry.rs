use chardev_interface::Minor;

/// Fixed set of instances, one per minor number.
///
/// Built once when a module loads and never resized, so lookups need no
/// locking; each instance synchronizes its own state.
pub struct Registry<I> {
    instances: Box<[I]>,
}

impl<I> Registry<I> {
    pub fn new(count: u32, mut create: impl FnMut(Minor) -> I) -> Self {
        let instances = (0..count).map(|minor| create(Minor::new(minor))).collect();
        Self { instances }
    }

    pub fn get(&self, minor: Minor) -> Option<&I> {
        self.instances.get(minor.index())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Minor, &I)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (Minor::new(i as u32), inst))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_single_instance_is_degenerate_case() {
        let reg = Registry::new(1, |minor| minor.get() * 10);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(Minor::new(0)), Some(&0));
        assert_eq!(reg.get(Minor::new(1)), None);
    }

    #[test]
    fn test_indexed_by_minor() {
        let reg = Registry::new(3, |minor| minor.get() * 10);
        let all: Vec<_> = reg.iter().map(|(m, v)| (m.get(), *v)).collect();
        assert_eq!(all, [(0, 0), (1, 10), (2, 20)]);
    }
}
