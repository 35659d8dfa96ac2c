//! Fixed-width bit sets used during DOF discovery.
//!
//! [`TypeSet`] marks which DOF slots exist on one entity, [`RankSet`] marks
//! which ranks see one DOF. Both have a compile-time capacity; callers check
//! problem sizes against `CAPACITY` before inserting.

macro_rules! fixed_bitset {
    ($(#[$doc:meta])* $name:ident, $word:ty) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name($word);

        impl $name {
            pub const CAPACITY: usize = <$word>::BITS as usize;

            #[inline]
            pub fn insert(&mut self, bit: usize) {
                debug_assert!(bit < Self::CAPACITY, "bit {bit} exceeds capacity");
                self.0 |= 1 << bit;
            }

            #[inline]
            pub fn contains(&self, bit: usize) -> bool {
                bit < Self::CAPACITY && (self.0 >> bit) & 1 == 1
            }

            /// Population count.
            #[inline]
            pub fn len(&self) -> usize {
                self.0.count_ones() as usize
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0 == 0
            }

            #[inline]
            pub fn union(self, other: Self) -> Self {
                $name(self.0 | other.0)
            }

            /// Set bits in ascending order.
            pub fn iter(&self) -> impl Iterator<Item = usize> {
                let mut w = self.0;
                std::iter::from_fn(move || {
                    if w == 0 {
                        return None;
                    }
                    let b = w.trailing_zeros() as usize;
                    w &= w - 1;
                    Some(b)
                })
            }
        }
    };
}

fixed_bitset!(
    /// One bit per DOF slot of an entity.
    TypeSet,
    u32
);

fixed_bitset!(
    /// One bit per cooperating rank.
    RankSet,
    u128
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacities() {
        assert_eq!(TypeSet::CAPACITY, 32);
        assert_eq!(RankSet::CAPACITY, 128);
    }

    #[test]
    fn iter_is_ascending_and_counts_match() {
        let mut r = RankSet::default();
        for b in [127, 3, 64, 0] {
            r.insert(b);
        }
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![0, 3, 64, 127]);
        assert_eq!(r.len(), 4);
        assert!(r.contains(64));
        assert!(!r.contains(65));
        assert!(!r.contains(500));
    }

    #[test]
    fn union_merges() {
        let mut a = TypeSet::default();
        let mut b = TypeSet::default();
        a.insert(1);
        b.insert(31);
        let u = a.union(b);
        assert_eq!(u.len(), 2);
        assert!(TypeSet::default().is_empty());
    }
}
