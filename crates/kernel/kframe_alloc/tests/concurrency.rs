use std::{
    collections::HashSet,
    ptr::NonNull,
    sync::{
        Mutex as StdMutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
};

use kframe_alloc::{FrameAllocator, KernelFrameAllocator, LockedFrameAllocator};
use kframe_params::FRAME_SIZE;
use kframe_sync::thread::ThreadCpu;

const THREADS: usize = 8;
const ROUNDS: usize = 500;

#[repr(C, align(4096))]
struct Page([u8; FRAME_SIZE]);

fn ram(pages: usize) -> Vec<Page> {
    (0..pages).map(|_| Page([0; FRAME_SIZE])).collect()
}

fn range(ram: &mut [Page]) -> std::ops::Range<NonNull<u8>> {
    let range = ram.as_mut_ptr_range();
    NonNull::new(range.start.cast()).unwrap()..NonNull::new(range.end.cast()).unwrap()
}

#[test]
fn single_frame_is_held_by_one_thread_at_a_time() {
    let mut ram = ram(1);
    let mut refs = [0; 1];
    let kmem: KernelFrameAllocator<'_, ThreadCpu> =
        LockedFrameAllocator::new(unsafe { FrameAllocator::new(range(&mut ram), &mut refs) });

    let held = AtomicBool::new(false);
    let acquired = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut done = 0;
                while done < ROUNDS {
                    let Ok(frame) = kmem.acquire() else {
                        thread::yield_now();
                        continue;
                    };
                    assert!(
                        !held.swap(true, Ordering::SeqCst),
                        "frame handed to two threads"
                    );
                    held.store(false, Ordering::SeqCst);
                    kmem.release(frame);
                    done += 1;
                }
                acquired.fetch_add(done, Ordering::Relaxed);
            });
        }
    });

    assert_eq!(acquired.load(Ordering::Relaxed), THREADS * ROUNDS);
    assert_eq!(kmem.free_frames(), 1);
}

#[test]
fn concurrent_acquires_never_overlap() {
    const FRAMES: usize = 32;

    let mut ram = ram(FRAMES);
    let mut refs = [0; FRAMES];
    let kmem = LockedFrameAllocator::<StdMutex<_>>::new(unsafe {
        FrameAllocator::<FRAME_SIZE>::new(range(&mut ram), &mut refs)
    });

    let in_use = StdMutex::new(HashSet::new());

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut mine = Vec::new();
                for round in 0..ROUNDS {
                    if round % 3 != 2 {
                        if let Ok(frame) = kmem.acquire() {
                            assert!(
                                in_use.lock().unwrap().insert(frame.addr()),
                                "{frame:?} handed out twice"
                            );
                            mine.push(frame);
                        }
                    } else if let Some(frame) = mine.pop() {
                        assert!(in_use.lock().unwrap().remove(&frame.addr()));
                        kmem.release(frame);
                    }
                }
                for frame in mine {
                    assert!(in_use.lock().unwrap().remove(&frame.addr()));
                    kmem.release(frame);
                }
            });
        }
    });

    assert!(in_use.lock().unwrap().is_empty());
    assert_eq!(kmem.info().free_frames, FRAMES);
}

#[test]
fn concurrent_share_and_release_frees_once() {
    let mut ram = ram(1);
    let mut refs = [0; 1];
    let kmem: KernelFrameAllocator<'_, ThreadCpu> =
        LockedFrameAllocator::new(unsafe { FrameAllocator::new(range(&mut ram), &mut refs) });

    let frame = kmem.acquire().unwrap();
    let copies = (0..THREADS).map(|_| kmem.share(&frame)).collect::<Vec<_>>();
    assert_eq!(usize::from(kmem.ref_count(&frame)), THREADS + 1);

    thread::scope(|s| {
        for copy in copies {
            let kmem = &kmem;
            s.spawn(move || kmem.release(copy));
        }
    });

    assert!(kmem.is_exclusive(&frame));
    assert_eq!(kmem.free_frames(), 0);
    kmem.release(frame);
    assert_eq!(kmem.free_frames(), 1);
}
