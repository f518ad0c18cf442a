//! Blocks of nodes that share a certificate value.
//!
//! The members of a block form an intrusive doubly-linked list over node indices,
//! so that nodes can be moved between blocks in constant time. Blocks only ever
//! split, which makes the block count monotone over a refinement.
use ahash::HashMap;
use smallvec::SmallVec;

const NIL: u32 = u32::MAX;

/// A class of nodes with the same certificate value.
#[derive(Clone, Debug)]
pub(crate) struct Block {
    head: u32,
    tail: u32,
    len: u32,
    /// Nodes that are being moved out of the block during a split.
    marked: u32,
    marked_len: u32,
    /// The certificate value shared by all members at the last split.
    value: i32,
}

impl Block {
    fn new(value: i32) -> Block {
        Block {
            head: NIL,
            tail: NIL,
            len: 0,
            marked: NIL,
            marked_len: 0,
            value,
        }
    }
}

/// A partition of the nodes of a graph into blocks.
#[derive(Clone, Debug)]
pub(crate) struct Partition {
    blocks: Vec<Block>,
    next: Vec<u32>,
    prev: Vec<u32>,
}

impl Partition {
    /// Create the partition of nodes `0..values.len()` by value.
    pub fn new(values: &[i32]) -> Partition {
        debug_assert!(values.len() < NIL as usize);

        let mut p = Partition {
            blocks: vec![],
            next: vec![NIL; values.len()],
            prev: vec![NIL; values.len()],
        };

        let mut index: HashMap<i32, u32> = HashMap::default();
        for (n, v) in values.iter().enumerate() {
            let b = *index.entry(*v).or_insert_with(|| {
                p.blocks.push(Block::new(*v));
                p.blocks.len() as u32 - 1
            });
            p.append(b, n as u32);
        }

        p
    }

    /// The number of blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` iff every node is in a block of its own.
    #[inline]
    pub fn is_discrete(&self) -> bool {
        self.blocks.len() == self.next.len()
    }

    /// Iterate over the nodes in `block`.
    pub fn members(&self, block: usize) -> impl Iterator<Item = usize> + '_ {
        let mut cur = self.blocks[block].head;
        std::iter::from_fn(move || {
            if cur == NIL {
                None
            } else {
                let n = cur;
                cur = self.next[n as usize];
                Some(n as usize)
            }
        })
    }

    fn append(&mut self, block: u32, node: u32) {
        let b = &mut self.blocks[block as usize];
        self.prev[node as usize] = b.tail;
        self.next[node as usize] = NIL;
        if b.tail == NIL {
            b.head = node;
        } else {
            self.next[b.tail as usize] = node;
        }
        b.tail = node;
        b.len += 1;
    }

    fn unlink(&mut self, block: u32, node: u32) {
        let (p, n) = (self.prev[node as usize], self.next[node as usize]);
        let b = &mut self.blocks[block as usize];
        if p == NIL {
            b.head = n;
        } else {
            self.next[p as usize] = n;
        }
        if n == NIL {
            b.tail = p;
        } else {
            self.prev[n as usize] = p;
        }
        b.len -= 1;
    }

    /// Move `node` from the member list of `block` to its marked list.
    fn mark(&mut self, block: u32, node: u32) {
        self.unlink(block, node);
        let b = &mut self.blocks[block as usize];
        self.next[node as usize] = b.marked;
        self.prev[node as usize] = NIL;
        b.marked = node;
        b.marked_len += 1;
    }

    fn pop_marked(&mut self, block: u32) -> Option<u32> {
        let b = &mut self.blocks[block as usize];
        if b.marked == NIL {
            return None;
        }

        let n = b.marked;
        b.marked = self.next[n as usize];
        b.marked_len -= 1;
        Some(n)
    }

    /// Split every block into groups of equal `values` and return the number of new blocks.
    pub fn split(&mut self, values: &[i32]) -> usize {
        let old_len = self.blocks.len();
        let mut groups: SmallVec<[(i32, u32); 4]> = SmallVec::new();

        for b in 0..old_len as u32 {
            let head = self.blocks[b as usize].head;
            if self.blocks[b as usize].len < 2 {
                if head != NIL {
                    self.blocks[b as usize].value = values[head as usize];
                }
                continue;
            }

            // the block keeps the members with the value of its head
            let keep = values[head as usize];
            let mut cur = self.next[head as usize];
            while cur != NIL {
                let n = self.next[cur as usize];
                if values[cur as usize] != keep {
                    self.mark(b, cur);
                }
                cur = n;
            }

            self.blocks[b as usize].value = keep;
            if self.blocks[b as usize].marked_len == 0 {
                continue;
            }

            groups.clear();
            while let Some(n) = self.pop_marked(b) {
                let v = values[n as usize];
                let target = match groups.iter().find(|g| g.0 == v) {
                    Some(g) => g.1,
                    None => {
                        self.blocks.push(Block::new(v));
                        let nb = self.blocks.len() as u32 - 1;
                        groups.push((v, nb));
                        nb
                    }
                };
                self.append(target, n);
            }
        }

        self.blocks.len() - old_len
    }

    /// Get the nodes of the smallest blocks with more than one member, choosing
    /// the blocks with the smallest value among those. All blocks of that size and
    /// value are joined, so the choice does not depend on node numbering.
    pub fn smallest_ambiguous_class(&self) -> Option<Vec<usize>> {
        let key = self
            .blocks
            .iter()
            .filter(|b| b.len > 1)
            .map(|b| (b.len, b.value))
            .min()?;

        let mut class = vec![];
        for (i, b) in self.blocks.iter().enumerate() {
            if (b.len, b.value) == key {
                class.extend(self.members(i));
            }
        }
        class.sort_unstable();
        Some(class)
    }
}
