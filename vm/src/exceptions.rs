use object::{CoreClasses, Heap, Value, is_instance_of};

/// Identifies one installed handler so the `on:do:` activation that
/// installed it can recognise a signal meant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Debug)]
struct Handler {
    id: HandlerId,
    class: Value,
    block: Value,
    next: Option<Box<Handler>>,
}

/// The dynamic chain of active protected regions, innermost first.
///
/// Owned by one [`VM`](crate::VM); independent VMs never share handlers.
#[derive(Debug, Default)]
pub struct HandlerChain {
    head: Option<Box<Handler>>,
    next_id: u64,
    depth: usize,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of installed handlers.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Arm a handler guarding `class`. It becomes the new chain head.
    pub fn push(&mut self, class: Value, block: Value) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        let next = self.head.take();
        self.head = Some(Box::new(Handler {
            id,
            class,
            block,
            next,
        }));
        self.depth += 1;
        id
    }

    /// Remove the handler `id`. Answers whether it was installed.
    ///
    /// Protected regions nest, so `id` is normally the head; a handler
    /// deeper in the chain is unlinked in place.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let mut skipped = Vec::new();
        let mut found = false;
        while let Some(mut handler) = self.head.take() {
            self.head = handler.next.take();
            if handler.id == id {
                found = true;
                break;
            }
            skipped.push(handler);
        }
        while let Some(mut handler) = skipped.pop() {
            handler.next = self.head.take();
            self.head = Some(handler);
        }
        if found {
            self.depth -= 1;
        }
        found
    }

    /// Find the innermost handler whose guarded class is exactly the class
    /// of `exception`. Subclasses do not match.
    pub fn find(
        &self,
        heap: &Heap,
        specials: &CoreClasses,
        exception: Value,
    ) -> Option<(HandlerId, Value)> {
        self.iter()
            .find(|h| is_instance_of(heap, specials, exception, h.class))
            .map(|h| (h.id, h.block))
    }

    /// `(guarded class, handler block)` pairs, innermost first.
    pub fn entries(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        self.iter().map(|h| (h.class, h.block))
    }

    fn iter(&self) -> impl Iterator<Item = &Handler> + '_ {
        std::iter::successors(self.head.as_deref(), |h| h.next.as_deref())
    }
}
