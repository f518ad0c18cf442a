//! Partitions of graph elements by certificate value.
use ahash::HashMap;
use smallvec::SmallVec;

use crate::certificate::ElementCertificate;

/// A map from certificate values to the elements that carry them.
///
/// Most classes hold a single element after refinement, so classes are
/// stored inline and only allocate once a second element arrives.
#[derive(Clone, Debug)]
pub struct PartitionMap<T = usize> {
    map: HashMap<i32, SmallVec<[T; 1]>>,
    one_to_one: bool,
}

impl<T: Copy> Default for PartitionMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> PartitionMap<T> {
    pub fn new() -> Self {
        PartitionMap {
            map: HashMap::default(),
            one_to_one: true,
        }
    }

    /// Build the partition of a list of certificates.
    pub fn from_certificates<'b, C: ElementCertificate<Element = T> + 'b>(
        certificates: impl IntoIterator<Item = &'b C>,
    ) -> Self {
        let mut p = Self::new();
        for c in certificates {
            p.add(c);
        }
        p
    }

    /// Add the element of `certificate` to the class of its certificate value.
    pub fn add<C: ElementCertificate<Element = T>>(&mut self, certificate: &C) {
        self.insert(certificate.value(), certificate.element());
    }

    /// Add `element` to the class of `value`.
    pub fn insert(&mut self, value: i32, element: T) {
        let class = self.map.entry(value).or_default();
        if !class.is_empty() {
            self.one_to_one = false;
        }
        class.push(element);
    }

    /// Get the elements with certificate value `value`.
    #[inline]
    pub fn get(&self, value: i32) -> &[T] {
        self.map.get(&value).map(|x| x.as_slice()).unwrap_or(&[])
    }

    /// Get the elements that share the value of `certificate`.
    #[inline]
    pub fn get_certificate<C: ElementCertificate<Element = T>>(&self, certificate: &C) -> &[T] {
        self.get(certificate.value())
    }

    /// Returns `true` iff every class has exactly one element.
    #[inline]
    pub fn is_one_to_one(&self) -> bool {
        self.one_to_one
    }

    /// The number of classes.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over all classes, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &[T])> {
        self.map.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Returns `true` iff `other` has the same values with classes of the same sizes.
    pub fn same_shape<U: Copy>(&self, other: &PartitionMap<U>) -> bool {
        self.len() == other.len()
            && self.one_to_one == other.one_to_one
            && self.map.iter().all(|(k, v)| other.get(*k).len() == v.len())
    }
}

#[cfg(test)]
mod test {
    use crate::certificate::NodeCertificate;

    use super::PartitionMap;

    #[test]
    fn one_to_one() {
        let mut p = PartitionMap::new();
        p.add(&NodeCertificate { node: 0, value: 5 });
        p.add(&NodeCertificate { node: 1, value: 7 });
        assert!(p.is_one_to_one());
        assert_eq!(p.len(), 2);
        assert_eq!(p.get(5), &[0]);

        p.add(&NodeCertificate { node: 2, value: 5 });
        assert!(!p.is_one_to_one());
        assert_eq!(p.get(5), &[0, 2]);
        assert_eq!(p.get(6), &[] as &[usize]);

        // once a collision has been seen, the map stays non-injective
        p.add(&NodeCertificate { node: 3, value: 9 });
        assert!(!p.is_one_to_one());
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn shape() {
        let a = PartitionMap::from_certificates(&[
            NodeCertificate { node: 0, value: 1 },
            NodeCertificate { node: 1, value: 1 },
            NodeCertificate { node: 2, value: 2 },
        ]);
        let b = PartitionMap::from_certificates(&[
            NodeCertificate { node: 0, value: 2 },
            NodeCertificate { node: 1, value: 1 },
            NodeCertificate { node: 2, value: 1 },
        ]);
        let c = PartitionMap::from_certificates(&[
            NodeCertificate { node: 0, value: 2 },
            NodeCertificate { node: 1, value: 2 },
            NodeCertificate { node: 2, value: 1 },
        ]);

        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }
}
