use std::{
    borrow::Borrow,
    cmp::{self, Ord, Ordering},
    collections::VecDeque,
    marker, mem,
    ops::{Bound, Deref, DerefMut, RangeBounds},
};

use rand::Rng;

use crate::depth::Depth;
use crate::error::Error;

/// OMap manage a single instance of in-memory ordered symbol table
/// using [left-leaning-red-black][llrb] tree.
///
/// Every node additionally carries the size of the subtree rooted at
/// it, which gives order-statistic queries, [`rank`] and [`select`],
/// in O(log n).
///
/// [llrb]: https://en.wikipedia.org/wiki/Left-leaning_red-black_tree
/// [`rank`]: OMap::rank
/// [`select`]: OMap::select
#[derive(Clone)]
pub struct OMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    root: Option<Box<Node<K, V>>>,
}

impl<K, V> Default for OMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    fn default() -> Self {
        OMap::new()
    }
}

/// Different ways to construct a new OMap instance.
impl<K, V> OMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Create an empty instance of OMap.
    pub fn new() -> OMap<K, V> {
        OMap { root: None }
    }

    /// Create a new instance of OMap and load it with entries from
    /// `iter`. Duplicate keys overwrite earlier entries.
    pub fn load_from<I>(iter: I) -> OMap<K, V>
    where
        I: Iterator<Item = (K, V)>,
    {
        let mut omap: OMap<K, V> = OMap::new();
        for (key, value) in iter {
            omap.set(key, value);
        }
        omap
    }
}

/// Maintenance API.
impl<K, V> OMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Return number of entries in this instance.
    #[inline]
    pub fn len(&self) -> usize {
        node_size(self.root_ref())
    }

    /// Check whether this index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Return quickly with basic statisics, only entries() method is valid
    /// with this statisics.
    pub fn stats(&self) -> Stats {
        Stats::new(self.len(), mem::size_of::<Node<K, V>>())
    }

    #[inline]
    fn root_ref(&self) -> Option<&Node<K, V>> {
        self.root.as_ref().map(Deref::deref)
    }
}

type Upsert<K, V> = (Box<Node<K, V>>, Option<V>);

type Delete<K, V> = (Option<Box<Node<K, V>>>, Option<V>);

type Delmin<K, V> = (Option<Box<Node<K, V>>>, Option<Node<K, V>>);

/// Write operations on OMap instance.
impl<K, V> OMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Set value for key. If there is an existing entry for key,
    /// overwrite the old value with new value and return the old value.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let (mut root, old_value) = OMap::upsert(self.root.take(), key, value);
        root.set_black();
        self.root = Some(root);
        old_value
    }

    /// Delete key from this instance and return its value. If key is
    /// not present, then delete is effectively a no-op: the tree is
    /// not even descended, so a miss costs one failed lookup and zero
    /// rotations.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_node(key)?;

        let mut root = self.root.take().unwrap();
        // deletion needs spare redness at the top to push down.
        if !is_red(root.left_deref()) && !is_red(root.right_deref()) {
            root.set_red();
        }
        let (root, old_value) = OMap::do_delete(Some(root), key);
        if let Some(mut root) = root {
            root.set_black();
            self.root = Some(root);
        }
        old_value
    }

    /// Remove the smallest entry and return it as (key, value).
    /// An empty instance returns [`Error::Underflow`].
    pub fn delete_min(&mut self) -> Result<(K, V), Error<K>> {
        let mut root = match self.root.take() {
            Some(root) => root,
            None => return Err(Error::Underflow),
        };
        if !is_red(root.left_deref()) && !is_red(root.right_deref()) {
            root.set_red();
        }
        let (root, removed) = OMap::do_delete_min(Some(root));
        if let Some(mut root) = root {
            root.set_black();
            self.root = Some(root);
        }
        match removed {
            Some(node) => Ok((node.key, node.value)),
            None => panic!("delete_min(): fatal logic, call the programmer"),
        }
    }

    /// Remove the largest entry and return it as (key, value).
    /// An empty instance returns [`Error::Underflow`].
    pub fn delete_max(&mut self) -> Result<(K, V), Error<K>> {
        let mut root = match self.root.take() {
            Some(root) => root,
            None => return Err(Error::Underflow),
        };
        if !is_red(root.left_deref()) && !is_red(root.right_deref()) {
            root.set_red();
        }
        let (root, removed) = OMap::do_delete_max(Some(root));
        if let Some(mut root) = root {
            root.set_black();
            self.root = Some(root);
        }
        match removed {
            Some(node) => Ok((node.key, node.value)),
            None => panic!("delete_max(): fatal logic, call the programmer"),
        }
    }

    /// Validate LLRB tree with following rules:
    ///
    /// * From root to any leaf, no consecutive reds allowed in its path.
    /// * No right link is red.
    /// * Number of blacks should be same under left child and right child.
    /// * Make sure keys are in sorted order.
    /// * Make sure every node's size field agrees with its subtree.
    /// * Make sure rank() and select() are inverses of each other.
    ///
    /// Additionally return full statistics on the tree. Refer to [`Stats`]
    /// for more information.
    pub fn validate(&self) -> Result<Stats, Error<K>> {
        let root = self.root_ref();
        let (red, nb, d) = (is_red(root), 0, 0);
        let mut stats = Stats::new(self.len(), mem::size_of::<Node<K, V>>());
        stats.set_depths(Depth::new());
        let blacks = OMap::validate_tree(root, red, nb, d, &mut stats)?;
        stats.set_blacks(blacks);
        self.validate_ranks()?;
        Ok(stats)
    }
}

/// Read operations on OMap instance.
impl<K, V> OMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    /// Get the value for key.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_node(key).map(|nref| nref.value.clone())
    }

    /// Check whether key is present in this instance.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_node(key).is_some()
    }

    /// Return the smallest key. An empty instance returns
    /// [`Error::Underflow`].
    pub fn min(&self) -> Result<K, Error<K>> {
        let mut node = match self.root_ref() {
            Some(root) => root,
            None => return Err(Error::Underflow),
        };
        while let Some(left) = node.left_deref() {
            node = left;
        }
        Ok(node.key.clone())
    }

    /// Return the largest key. An empty instance returns
    /// [`Error::Underflow`].
    pub fn max(&self) -> Result<K, Error<K>> {
        let mut node = match self.root_ref() {
            Some(root) => root,
            None => return Err(Error::Underflow),
        };
        while let Some(right) = node.right_deref() {
            node = right;
        }
        Ok(node.key.clone())
    }

    /// Return the largest key less than or equal to `key`. An empty
    /// instance returns [`Error::Underflow`], and when every key is
    /// greater than `key` return [`Error::NoFloor`].
    pub fn floor<Q>(&self, key: &Q) -> Result<K, Error<K>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if self.is_empty() {
            return Err(Error::Underflow);
        }
        match OMap::do_floor(self.root_ref(), key) {
            Some(node) => Ok(node.key.clone()),
            None => Err(Error::NoFloor),
        }
    }

    /// Return the smallest key greater than or equal to `key`. An empty
    /// instance returns [`Error::Underflow`], and when every key is
    /// less than `key` return [`Error::NoCeil`].
    pub fn ceil<Q>(&self, key: &Q) -> Result<K, Error<K>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if self.is_empty() {
            return Err(Error::Underflow);
        }
        match OMap::do_ceil(self.root_ref(), key) {
            Some(node) => Ok(node.key.clone()),
            None => Err(Error::NoCeil),
        }
    }

    /// Return the number of keys strictly less than `key`. The key
    /// itself need not be present.
    pub fn rank<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        OMap::do_rank(self.root_ref(), key)
    }

    /// Return the key of the given rank, in other words the
    /// (rank+1)-th smallest key. Inverse of [`rank`]. Ranks outside
    /// `0..len()` return [`Error::RankOutOfBounds`].
    ///
    /// [`rank`]: OMap::rank
    pub fn select(&self, rank: usize) -> Result<K, Error<K>> {
        if rank >= self.len() {
            return Err(Error::RankOutOfBounds(rank, self.len()));
        }
        match OMap::do_select(self.root_ref(), rank) {
            Some(node) => Ok(node.key.clone()),
            None => panic!("select(): fatal logic, call the programmer"),
        }
    }

    /// Return all keys in ascending order. An empty instance returns
    /// an empty vector.
    pub fn keys(&self) -> Vec<K> {
        let mut acc = Vec::with_capacity(self.len());
        OMap::collect_keys(self.root_ref(), &mut acc);
        acc
    }

    /// Return the keys in `[low, high]`, both bounds inclusive, in
    /// ascending order.
    pub fn range_keys<Q>(&self, low: &Q, high: &Q) -> Vec<K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut acc = Vec::new();
        OMap::collect_range_keys(self.root_ref(), low, high, &mut acc);
        acc
    }

    /// Return the number of keys in `[low, high]`, both bounds
    /// inclusive. Computed from [`rank`] arithmetic without walking
    /// the range.
    ///
    /// [`rank`]: OMap::rank
    pub fn range_count<Q>(&self, low: &Q, high: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if low.gt(high) {
            0
        } else if self.contains_key(high) {
            self.rank(high) - self.rank(low) + 1
        } else {
            self.rank(high) - self.rank(low)
        }
    }

    /// Return the number of nodes on the longest root-to-leaf path.
    /// An empty instance has height 0. Balance bounds this by
    /// 2*log2(len+1). Useful as diagnostics.
    pub fn height(&self) -> usize {
        OMap::do_height(self.root_ref())
    }

    /// Return keys level by level, root first. Useful as diagnostics,
    /// the layout mirrors the tree's shape.
    pub fn level_order(&self) -> Vec<Vec<K>> {
        let mut levels = Vec::new();
        let mut queue = VecDeque::new();
        if let Some(root) = self.root_ref() {
            queue.push_back(root);
        }
        while !queue.is_empty() {
            let mut level = Vec::with_capacity(queue.len());
            for _ in 0..queue.len() {
                let node = queue.pop_front().unwrap();
                level.push(node.key.clone());
                if let Some(left) = node.left_deref() {
                    queue.push_back(left);
                }
                if let Some(right) = node.right_deref() {
                    queue.push_back(right);
                }
            }
            levels.push(level);
        }
        levels
    }

    /// Return a uniformly random entry from this index, picked by
    /// drawing a random rank.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<(K, V)> {
        if self.is_empty() {
            return None;
        }
        let rank = rng.gen_range(0, self.len());
        match OMap::do_select(self.root_ref(), rank) {
            Some(node) => Some((node.key.clone(), node.value.clone())),
            None => panic!("random(): fatal logic, call the programmer"),
        }
    }

    /// Return an iterator over all entries in this instance.
    pub fn iter(&self) -> Iter<K, V> {
        let mut paths = Vec::new();
        min_path(self.root_ref(), &mut paths);
        Iter { paths }
    }

    /// Range over all entries from low to high, as given by `range`.
    pub fn range<R, Q>(&self, range: R) -> Range<K, V, R, Q>
    where
        K: Borrow<Q>,
        R: RangeBounds<Q>,
        Q: Ord + ?Sized,
    {
        let root = self.root_ref();
        let mut paths = Vec::new();
        match range.start_bound() {
            Bound::Unbounded => min_path(root, &mut paths),
            Bound::Included(low) => start_path(root, low, true, &mut paths),
            Bound::Excluded(low) => start_path(root, low, false, &mut paths),
        };
        Range {
            root,
            paths,
            range,
            fin: false,
            _high: marker::PhantomData,
        }
    }

    fn get_node<Q>(&self, key: &Q) -> Option<&Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = self.root_ref();
        while let Some(nref) = node {
            node = match nref.key.borrow().cmp(key) {
                Ordering::Less => nref.right_deref(),
                Ordering::Greater => nref.left_deref(),
                Ordering::Equal => return Some(nref),
            };
        }
        None
    }
}

impl<K, V> OMap<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    fn upsert(node: Option<Box<Node<K, V>>>, key: K, value: V) -> Upsert<K, V> {
        let mut node = match node {
            Some(node) => node,
            None => return (Node::new(key, value, false /*black*/), None),
        };

        match node.key.cmp(&key) {
            Ordering::Greater => {
                let (left, o) = OMap::upsert(node.left.take(), key, value);
                node.left = Some(left);
                (OMap::fixup(node), o)
            }
            Ordering::Less => {
                let (right, o) = OMap::upsert(node.right.take(), key, value);
                node.right = Some(right);
                (OMap::fixup(node), o)
            }
            Ordering::Equal => {
                let old_value = node.value.clone();
                node.set_value(value);
                (OMap::fixup(node), Some(old_value))
            }
        }
    }

    fn do_delete<Q>(node: Option<Box<Node<K, V>>>, key: &Q) -> Delete<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = match node {
            None => return (None, None),
            Some(node) => node,
        };

        if node.key.borrow().gt(key) {
            if node.left.is_none() {
                (Some(node), None)
            } else {
                let ok = !is_red(node.left_deref());
                if ok && !is_red(node.left.as_ref().unwrap().left_deref()) {
                    node = OMap::move_red_left(node);
                }
                let (left, old_value) = OMap::do_delete(node.left.take(), key);
                node.left = left;
                (Some(OMap::fixup(node)), old_value)
            }
        } else {
            if is_red(node.left_deref()) {
                node = OMap::rotate_right(node);
            }

            if !node.key.borrow().lt(key) && node.right.is_none() {
                let node = *node;
                return (None, Some(node.value));
            }

            let ok = node.right.is_some() && !is_red(node.right_deref());
            if ok && !is_red(node.right.as_ref().unwrap().left_deref()) {
                node = OMap::move_red_right(node);
            }

            if !node.key.borrow().lt(key) {
                // node == key, replace it with its in-order successor.
                let (right, mut res_node) = OMap::do_delete_min(node.right.take());
                if res_node.is_none() {
                    panic!("do_delete(): fatal logic, call the programmer");
                }
                let subdel = res_node.take().unwrap();
                let mut newnode = Node::new(subdel.key, subdel.value, node.black);
                newnode.left = node.left.take();
                newnode.right = right;
                (Some(OMap::fixup(newnode)), Some(node.value))
            } else {
                let (right, old_value) = OMap::do_delete(node.right.take(), key);
                node.right = right;
                (Some(OMap::fixup(node)), old_value)
            }
        }
    }

    fn do_delete_min(node: Option<Box<Node<K, V>>>) -> Delmin<K, V> {
        let mut node = match node {
            None => return (None, None),
            Some(node) => node,
        };
        if node.left.is_none() {
            // left-leaning invariant: no right child either.
            return (None, Some(*node));
        }
        let left = node.left_deref();
        if !is_red(left) && !is_red(left.unwrap().left_deref()) {
            node = OMap::move_red_left(node);
        }
        let (left, old_node) = OMap::do_delete_min(node.left.take());
        node.left = left;
        (Some(OMap::fixup(node)), old_node)
    }

    fn do_delete_max(node: Option<Box<Node<K, V>>>) -> Delmin<K, V> {
        let mut node = match node {
            None => return (None, None),
            Some(node) => node,
        };
        if is_red(node.left_deref()) {
            node = OMap::rotate_right(node);
        }
        if node.right.is_none() {
            return (None, Some(*node));
        }
        let right = node.right_deref();
        if !is_red(right) && !is_red(right.unwrap().left_deref()) {
            node = OMap::move_red_right(node);
        }
        let (right, old_node) = OMap::do_delete_max(node.right.take());
        node.right = right;
        (Some(OMap::fixup(node)), old_node)
    }

    fn do_floor<'a, Q>(node: Option<&'a Node<K, V>>, key: &Q) -> Option<&'a Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = node?;
        match node.key.borrow().cmp(key) {
            Ordering::Equal => Some(node),
            Ordering::Greater => OMap::do_floor(node.left_deref(), key),
            Ordering::Less => OMap::do_floor(node.right_deref(), key).or(Some(node)),
        }
    }

    fn do_ceil<'a, Q>(node: Option<&'a Node<K, V>>, key: &Q) -> Option<&'a Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = node?;
        match node.key.borrow().cmp(key) {
            Ordering::Equal => Some(node),
            Ordering::Less => OMap::do_ceil(node.right_deref(), key),
            Ordering::Greater => OMap::do_ceil(node.left_deref(), key).or(Some(node)),
        }
    }

    fn do_rank<Q>(node: Option<&Node<K, V>>, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = match node {
            Some(node) => node,
            None => return 0,
        };
        match node.key.borrow().cmp(key) {
            Ordering::Greater => OMap::do_rank(node.left_deref(), key),
            Ordering::Less => {
                1 + node_size(node.left_deref()) + OMap::do_rank(node.right_deref(), key)
            }
            Ordering::Equal => node_size(node.left_deref()),
        }
    }

    fn do_select(node: Option<&Node<K, V>>, rank: usize) -> Option<&Node<K, V>> {
        let node = node?;
        let lsize = node_size(node.left_deref());
        match rank.cmp(&lsize) {
            Ordering::Less => OMap::do_select(node.left_deref(), rank),
            Ordering::Greater => OMap::do_select(node.right_deref(), rank - lsize - 1),
            Ordering::Equal => Some(node),
        }
    }

    fn do_height(node: Option<&Node<K, V>>) -> usize {
        match node {
            None => 0,
            Some(node) => {
                let lheight = OMap::do_height(node.left_deref());
                let rheight = OMap::do_height(node.right_deref());
                1 + cmp::max(lheight, rheight)
            }
        }
    }

    fn collect_keys(node: Option<&Node<K, V>>, acc: &mut Vec<K>) {
        if let Some(node) = node {
            OMap::collect_keys(node.left_deref(), acc);
            acc.push(node.key.clone());
            OMap::collect_keys(node.right_deref(), acc);
        }
    }

    fn collect_range_keys<Q>(node: Option<&Node<K, V>>, low: &Q, high: &Q, acc: &mut Vec<K>)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if let Some(node) = node {
            let key = node.key.borrow();
            if low.lt(key) {
                OMap::collect_range_keys(node.left_deref(), low, high, acc);
            }
            if low.le(key) && key.le(high) {
                acc.push(node.key.clone());
            }
            if key.lt(high) {
                OMap::collect_range_keys(node.right_deref(), low, high, acc);
            }
        }
    }

    fn validate_tree(
        node: Option<&Node<K, V>>,
        fromred: bool,
        mut nb: usize,
        depth: usize,
        stats: &mut Stats,
    ) -> Result<usize, Error<K>> {
        let node = match node {
            Some(node) => node,
            None => {
                stats.depths.as_mut().unwrap().sample(depth);
                return Ok(nb);
            }
        };

        if is_red(node.right_deref()) {
            return Err(Error::RightLeaningRed);
        }
        let red = is_red(Some(node));
        if fromred && red {
            return Err(Error::ConsecutiveReds);
        }
        if !red {
            nb += 1;
        }

        let (left, right) = (node.left_deref(), node.right_deref());
        if node.size != 1 + node_size(left) + node_size(right) {
            let err = format!(
                "node: {} left: {} right: {}",
                node.size,
                node_size(left),
                node_size(right)
            );
            return Err(Error::SizeMismatch(err));
        }

        let lblacks = OMap::validate_tree(left, red, nb, depth + 1, stats)?;
        let rblacks = OMap::validate_tree(right, red, nb, depth + 1, stats)?;
        if lblacks != rblacks {
            let err = format!("left: {} right: {}", lblacks, rblacks);
            return Err(Error::UnbalancedBlacks(err));
        }
        if let Some(left) = left {
            if left.key.ge(&node.key) {
                let (lkey, parent) = (left.key.clone(), node.key.clone());
                return Err(Error::SortError(lkey, parent));
            }
        }
        if let Some(right) = right {
            if right.key.le(&node.key) {
                let (rkey, parent) = (right.key.clone(), node.key.clone());
                return Err(Error::SortError(rkey, parent));
            }
        }
        Ok(lblacks)
    }

    fn validate_ranks(&self) -> Result<(), Error<K>> {
        for i in 0..self.len() {
            let key = self.select(i)?;
            if self.rank(&key) != i {
                return Err(Error::RankMismatch(i));
            }
        }
        for (i, key) in self.keys().into_iter().enumerate() {
            if self.select(self.rank(&key))? != key {
                return Err(Error::RankMismatch(i));
            }
        }
        Ok(())
    }

    //--------- rotation routines for 2-3 algorithm ----------------

    // fix-up on the way back from a mutated subtree, in this order:
    //
    // * rotate a right-leaning red link to left,
    // * rotate consecutive left-leaning reds to split them,
    // * flip both-red children into a red parent link,
    //
    // and refresh the size field from the (now final) children.
    fn fixup(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        if is_red(node.right_deref()) && !is_red(node.left_deref()) {
            node = OMap::rotate_left(node);
        }
        let left = node.left_deref();
        if is_red(left) && is_red(left.unwrap().left_deref()) {
            node = OMap::rotate_right(node);
        }
        if is_red(node.left_deref()) && is_red(node.right_deref()) {
            OMap::flip(node.deref_mut());
        }
        node.update_size();
        node
    }

    //              (i)                       (i)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //             /    (r)                 (r)  \
    //            /       \                 /     \
    //          left       x             node      xr
    //                    / \            /  \
    //                  xl   xr       left   xl
    //
    fn rotate_left(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        if is_black(node.right_deref()) {
            panic!("rotateleft(): rotating a black link ? Call the programmer");
        }
        let mut x = node.right.take().unwrap();
        node.right = x.left.take();
        x.black = node.black;
        node.set_red();
        x.size = node.size;
        node.update_size();
        x.left = Some(node);
        x
    }

    //              (i)                       (i)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //            (r)   \                   (r)  \
    //           /       \                 /      \
    //          x       right             xl      node
    //         / \                                / \
    //       xl   xr                             xr  right
    //
    fn rotate_right(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        if is_black(node.left_deref()) {
            panic!("rotateright(): rotating a black link ? Call the programmer")
        }
        let mut x = node.left.take().unwrap();
        node.left = x.right.take();
        x.black = node.black;
        node.set_red();
        x.size = node.size;
        node.update_size();
        x.right = Some(node);
        x
    }

    //        (x)                   (!x)
    //         |                     |
    //        node                  node
    //        / \                   / \
    //      (y) (z)              (!y) (!z)
    //     /      \              /      \
    //   left    right         left    right
    //
    fn flip(node: &mut Node<K, V>) {
        node.left.as_mut().unwrap().toggle_link();
        node.right.as_mut().unwrap().toggle_link();
        node.toggle_link();
    }

    // node is red, node.left and node.left.left are black: shift
    // redness so that node.left or one of its children turns red,
    // making it safe to delete on the left.
    fn move_red_left(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        OMap::flip(node.deref_mut());
        if is_red(node.right.as_ref().unwrap().left_deref()) {
            node.right = Some(OMap::rotate_right(node.right.take().unwrap()));
            node = OMap::rotate_left(node);
            OMap::flip(node.deref_mut());
        }
        node
    }

    // mirror of move_red_left, for deleting on the right.
    fn move_red_right(mut node: Box<Node<K, V>>) -> Box<Node<K, V>> {
        OMap::flip(node.deref_mut());
        if is_red(node.left.as_ref().unwrap().left_deref()) {
            node = OMap::rotate_right(node);
            OMap::flip(node.deref_mut());
        }
        node
    }
}

fn is_red<K, V>(node: Option<&Node<K, V>>) -> bool
where
    K: Clone + Ord,
    V: Clone,
{
    node.map_or(false, |node| !node.is_black())
}

fn is_black<K, V>(node: Option<&Node<K, V>>) -> bool
where
    K: Clone + Ord,
    V: Clone,
{
    node.map_or(true, |node| node.is_black())
}

fn node_size<K, V>(node: Option<&Node<K, V>>) -> usize
where
    K: Clone + Ord,
    V: Clone,
{
    node.map_or(0, |node| node.size)
}

// push node and its left spine, the minimum path of the subtree.
fn min_path<'a, K, V>(mut node: Option<&'a Node<K, V>>, paths: &mut Vec<&'a Node<K, V>>)
where
    K: Clone + Ord,
    V: Clone,
{
    while let Some(nref) = node {
        paths.push(nref);
        node = nref.left_deref();
    }
}

// push node and its right spine, the maximum path of the subtree.
fn max_path<'a, K, V>(mut node: Option<&'a Node<K, V>>, paths: &mut Vec<&'a Node<K, V>>)
where
    K: Clone + Ord,
    V: Clone,
{
    while let Some(nref) = node {
        paths.push(nref);
        node = nref.right_deref();
    }
}

// seed the forward path-stack with nodes at or after the lower bound.
fn start_path<'a, K, V, Q>(
    mut node: Option<&'a Node<K, V>>,
    low: &Q,
    incl: bool,
    paths: &mut Vec<&'a Node<K, V>>,
) where
    K: Clone + Ord + Borrow<Q>,
    V: Clone,
    Q: Ord + ?Sized,
{
    while let Some(nref) = node {
        node = match nref.key.borrow().cmp(low) {
            Ordering::Less => nref.right_deref(),
            Ordering::Equal if incl => {
                paths.push(nref);
                None
            }
            Ordering::Equal => nref.right_deref(),
            Ordering::Greater => {
                paths.push(nref);
                nref.left_deref()
            }
        };
    }
}

// seed the reverse path-stack with nodes at or before the upper bound.
fn end_path<'a, K, V, Q>(
    mut node: Option<&'a Node<K, V>>,
    high: &Q,
    incl: bool,
    paths: &mut Vec<&'a Node<K, V>>,
) where
    K: Clone + Ord + Borrow<Q>,
    V: Clone,
    Q: Ord + ?Sized,
{
    while let Some(nref) = node {
        node = match nref.key.borrow().cmp(high) {
            Ordering::Greater => nref.left_deref(),
            Ordering::Equal if incl => {
                paths.push(nref);
                None
            }
            Ordering::Equal => nref.left_deref(),
            Ordering::Less => {
                paths.push(nref);
                nref.right_deref()
            }
        };
    }
}

/// Iterator over all entries of an [`OMap`] instance, in ascending
/// key order.
pub struct Iter<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    paths: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.paths.pop()?;
        min_path(node.right_deref(), &mut self.paths);
        Some((node.key.clone(), node.value.clone()))
    }
}

/// Iterator over a bounded range of entries, in ascending key order.
pub struct Range<'a, K, V, R, Q>
where
    K: Clone + Ord,
    V: Clone,
    Q: ?Sized,
{
    root: Option<&'a Node<K, V>>,
    paths: Vec<&'a Node<K, V>>,
    range: R,
    fin: bool,
    _high: marker::PhantomData<Q>,
}

impl<'a, K, V, R, Q> Range<'a, K, V, R, Q>
where
    K: Clone + Ord + Borrow<Q>,
    V: Clone,
    R: RangeBounds<Q>,
    Q: Ord + ?Sized,
{
    /// Flip this range into descending key order, walking from the
    /// upper bound towards the lower bound.
    pub fn rev(self) -> Reverse<'a, K, V, R, Q> {
        let mut paths = Vec::new();
        match self.range.end_bound() {
            Bound::Unbounded => max_path(self.root, &mut paths),
            Bound::Included(high) => end_path(self.root, high, true, &mut paths),
            Bound::Excluded(high) => end_path(self.root, high, false, &mut paths),
        };
        Reverse {
            paths,
            range: self.range,
            fin: false,
            _low: marker::PhantomData,
        }
    }
}

impl<'a, K, V, R, Q> Iterator for Range<'a, K, V, R, Q>
where
    K: Clone + Ord + Borrow<Q>,
    V: Clone,
    R: RangeBounds<Q>,
    Q: Ord + ?Sized,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.fin {
            return None;
        }
        let node = self.paths.pop()?;
        min_path(node.right_deref(), &mut self.paths);
        let item = (node.key.clone(), node.value.clone());
        match self.range.end_bound() {
            Bound::Included(high) if node.key.borrow().le(high) => Some(item),
            Bound::Excluded(high) if node.key.borrow().lt(high) => Some(item),
            Bound::Unbounded => Some(item),
            Bound::Included(_) | Bound::Excluded(_) => {
                self.fin = true;
                None
            }
        }
    }
}

/// Iterator over a bounded range of entries, in descending key order.
pub struct Reverse<'a, K, V, R, Q>
where
    K: Clone + Ord,
    V: Clone,
    Q: ?Sized,
{
    paths: Vec<&'a Node<K, V>>,
    range: R,
    fin: bool,
    _low: marker::PhantomData<Q>,
}

impl<'a, K, V, R, Q> Iterator for Reverse<'a, K, V, R, Q>
where
    K: Clone + Ord + Borrow<Q>,
    V: Clone,
    R: RangeBounds<Q>,
    Q: Ord + ?Sized,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.fin {
            return None;
        }
        let node = self.paths.pop()?;
        max_path(node.left_deref(), &mut self.paths);
        let item = (node.key.clone(), node.value.clone());
        match self.range.start_bound() {
            Bound::Included(low) if node.key.borrow().ge(low) => Some(item),
            Bound::Excluded(low) if node.key.borrow().gt(low) => Some(item),
            Bound::Unbounded => Some(item),
            Bound::Included(_) | Bound::Excluded(_) => {
                self.fin = true;
                None
            }
        }
    }
}

/// Node corresponds to a single entry in OMap instance.
#[derive(Clone)]
pub struct Node<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    key: K,
    value: V,
    black: bool,                    // store: black or red
    size: usize,                    // store: count of nodes in this subtree
    left: Option<Box<Node<K, V>>>,  // store: left child
    right: Option<Box<Node<K, V>>>, // store: right child
}

// Primary operations on a single node.
impl<K, V> Node<K, V>
where
    K: Clone + Ord,
    V: Clone,
{
    // CREATE operation
    fn new(key: K, value: V, black: bool) -> Box<Node<K, V>> {
        Box::new(Node {
            key,
            value,
            black,
            size: 1,
            left: None,
            right: None,
        })
    }

    #[inline]
    fn left_deref(&self) -> Option<&Node<K, V>> {
        self.left.as_ref().map(Deref::deref)
    }

    #[inline]
    fn right_deref(&self) -> Option<&Node<K, V>> {
        self.right.as_ref().map(Deref::deref)
    }

    // prepend operation, equivalent to SET / INSERT / UPDATE
    #[inline]
    fn set_value(&mut self, value: V) {
        self.value = value
    }

    #[inline]
    fn set_red(&mut self) {
        self.black = false
    }

    #[inline]
    fn set_black(&mut self) {
        self.black = true
    }

    #[inline]
    fn toggle_link(&mut self) {
        self.black = !self.black
    }

    #[inline]
    fn is_black(&self) -> bool {
        self.black
    }

    #[inline]
    fn update_size(&mut self) {
        self.size = 1 + node_size(self.left_deref()) + node_size(self.right_deref());
    }
}

/// Statistics on [`OMap`] tree. Serves two purpose:
///
/// * To get partial but quick statistics via [`OMap::stats`] method.
/// * To get full statisics via [`OMap::validate`] method.
#[derive(Default, Debug)]
pub struct Stats {
    entries: usize, // number of entries in the tree.
    node_size: usize,
    blacks: Option<usize>,
    depths: Option<Depth>,
}

impl Stats {
    fn new(entries: usize, node_size: usize) -> Stats {
        Stats {
            entries,
            node_size,
            blacks: Default::default(),
            depths: Default::default(),
        }
    }

    #[inline]
    fn set_blacks(&mut self, blacks: usize) {
        self.blacks = Some(blacks)
    }

    #[inline]
    fn set_depths(&mut self, depths: Depth) {
        self.depths = Some(depths)
    }

    /// Return number entries in [`OMap`] instance.
    #[inline]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Return node-size, including over-head for `OMap<K,V>`. Although
    /// the node overhead is constant, the node size varies based on
    /// key and value types.
    #[inline]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Return number of black links from root to leaf, on both left
    /// and right child.
    #[inline]
    pub fn blacks(&self) -> Option<usize> {
        self.blacks
    }

    /// Return [`Depth`] statistics.
    pub fn depths(&self) -> Option<Depth> {
        match &self.depths {
            Some(depths) if depths.samples() > 0 => Some(depths.clone()),
            _ => None,
        }
    }
}
