use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use zmusic::invariant_rt::new_invariant_queue;
use zmusic::relay::{relay, AudioFrameBlock};
use zmusic::rt::RenderCallback;

thread_local! {
    static ALLOC_COUNT: Cell<usize> = const { Cell::new(0) };
}

struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOC_COUNT.try_with(|c| c.set(c.get() + 1));
        unsafe { System.alloc(layout) }
    }
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

fn allocations() -> usize {
    ALLOC_COUNT.with(|c| c.get())
}

#[test]
fn render_callback_does_not_allocate() {
    let (mut publisher, consumer) = relay();
    let (inv_tx, _inv_rx) = new_invariant_queue();
    let mut callback = RenderCallback::with_invariants(consumer, inv_tx);
    let mut outputs = vec![vec![0.0; 128]; 4];
    let block = AudioFrameBlock::mono(vec![0.5; 256]);

    // Warm up thread-local state in the slot implementation.
    for _ in 0..4 {
        publisher.publish(block.clone());
        callback.process(&mut outputs);
        callback.process(&mut outputs);
    }

    for _ in 0..1_000 {
        publisher.publish(block.clone());

        let before = allocations();
        callback.process(&mut outputs);
        callback.process(&mut outputs);
        assert_eq!(
            allocations(),
            before,
            "render callback should not allocate"
        );
    }
}
