//! Relocatable instruction list.
//!
//! Instructions live in an index-stable arena; their order is a doubly linked
//! list threaded through the arena. Inserting, moving a range and truncating
//! never change an instruction's [`InstrId`], so labels (which are ids) stay
//! valid across every edit.

use crate::bytecode::{InstrId, Instruction};

#[derive(Debug)]
struct Node {
    instr: Instruction,
    prev: Option<InstrId>,
    next: Option<InstrId>,
    /// Whether the node is currently part of the ordered list.
    attached: bool,
}

#[derive(Debug, Default)]
pub struct InstructionList {
    nodes: Vec<Node>,
    head: Option<InstrId>,
    tail: Option<InstrId>,
    len: usize,
}

impl InstructionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached instructions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<InstrId> {
        self.head
    }

    pub fn tail(&self) -> Option<InstrId> {
        self.tail
    }

    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.nodes.get(id.index()).map(|n| &n.instr)
    }

    pub fn get_mut(&mut self, id: InstrId) -> Option<&mut Instruction> {
        self.nodes.get_mut(id.index()).map(|n| &mut n.instr)
    }

    pub fn is_attached(&self, id: InstrId) -> bool {
        self.nodes.get(id.index()).is_some_and(|n| n.attached)
    }

    pub fn next(&self, id: InstrId) -> Option<InstrId> {
        self.nodes.get(id.index()).and_then(|n| n.next)
    }

    pub fn prev(&self, id: InstrId) -> Option<InstrId> {
        self.nodes.get(id.index()).and_then(|n| n.prev)
    }

    fn node(&mut self, id: InstrId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Allocate an instruction without placing it in the order.
    pub fn alloc_detached(&mut self, instr: Instruction) -> InstrId {
        let id = InstrId(self.nodes.len() as u32);
        self.nodes.push(Node {
            instr,
            prev: None,
            next: None,
            attached: false,
        });
        id
    }

    /// Append a new instruction.
    pub fn push_back(&mut self, instr: Instruction) -> InstrId {
        let id = self.alloc_detached(instr);
        self.attach_back(id);
        id
    }

    /// Append a detached instruction. Attached instructions are left alone.
    pub fn attach_back(&mut self, id: InstrId) {
        if self.is_attached(id) {
            return;
        }
        let tail = self.tail;
        {
            let node = self.node(id);
            node.prev = tail;
            node.next = None;
            node.attached = true;
        }
        match tail {
            Some(t) => self.node(t).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// Insert a new instruction right after `anchor`.
    pub fn insert_after(&mut self, anchor: InstrId, instr: Instruction) -> InstrId {
        let id = self.alloc_detached(instr);
        let next = self.next(anchor);
        self.link_between(id, Some(anchor), next);
        id
    }

    /// Insert a new instruction right before `anchor`.
    pub fn insert_before(&mut self, anchor: InstrId, instr: Instruction) -> InstrId {
        let id = self.alloc_detached(instr);
        let prev = self.prev(anchor);
        self.link_between(id, prev, Some(anchor));
        id
    }

    fn link_between(&mut self, id: InstrId, prev: Option<InstrId>, next: Option<InstrId>) {
        {
            let node = self.node(id);
            node.prev = prev;
            node.next = next;
            node.attached = true;
        }
        match prev {
            Some(p) => self.node(p).next = Some(id),
            None => self.head = Some(id),
        }
        match next {
            Some(n) => self.node(n).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.len += 1;
    }

    /// Move the attached range `first..=last` so that it sits immediately
    /// before `anchor`. `anchor` must not be inside the range.
    pub fn move_range_before(&mut self, first: InstrId, last: InstrId, anchor: InstrId) {
        if first == anchor || self.next(last) == Some(anchor) {
            return;
        }
        // unlink the range
        let before = self.prev(first);
        let after = self.next(last);
        match before {
            Some(b) => self.node(b).next = after,
            None => self.head = after,
        }
        match after {
            Some(a) => self.node(a).prev = before,
            None => self.tail = before,
        }
        // relink before the anchor
        let anchor_prev = self.prev(anchor);
        match anchor_prev {
            Some(p) => self.node(p).next = Some(first),
            None => self.head = Some(first),
        }
        self.node(first).prev = anchor_prev;
        self.node(last).next = Some(anchor);
        self.node(anchor).prev = Some(last);
    }

    /// Detach every instruction after `keep`; `None` empties the list.
    /// Detached nodes stay in the arena, so ids are never reused.
    pub fn truncate_after(&mut self, keep: Option<InstrId>) {
        let mut cursor = match keep {
            Some(k) => self.next(k),
            None => self.head,
        };
        while let Some(id) = cursor {
            cursor = self.next(id);
            let node = self.node(id);
            node.attached = false;
            node.prev = None;
            node.next = None;
            self.len -= 1;
        }
        match keep {
            Some(k) => self.node(k).next = None,
            None => self.head = None,
        }
        self.tail = keep;
    }

    /// Ids in order.
    pub fn ids(&self) -> ListIter<'_> {
        ListIter {
            list: self,
            cursor: self.head,
        }
    }

    /// Instructions in order.
    pub fn iter(&self) -> impl Iterator<Item = (InstrId, &Instruction)> {
        self.ids().filter_map(|id| self.get(id).map(|i| (id, i)))
    }
}

pub struct ListIter<'a> {
    list: &'a InstructionList,
    cursor: Option<InstrId>,
}

impl Iterator for ListIter<'_> {
    type Item = InstrId;

    fn next(&mut self) -> Option<InstrId> {
        let current = self.cursor?;
        self.cursor = self.list.next(current);
        Some(current)
    }
}
