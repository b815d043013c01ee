use std::time::Instant;
use zmusic::relay::{relay, AudioFrameBlock};
use zmusic::rt::RenderCallback;

#[test]
fn rt_timing_stability() {
    let (mut publisher, consumer) = relay();
    let mut callback = RenderCallback::new(consumer);
    let mut outputs = vec![vec![0.0; 128]; 8];
    let block = AudioFrameBlock::mono(vec![0.1; 128]);

    let start = Instant::now();
    for _ in 0..1000 {
        publisher.publish_from(block.left(), block.right()).unwrap();
        callback.process(&mut outputs);
    }
    let duration = start.elapsed();
    // Assert bounded: less than 1 second for 1000 quanta
    assert!(duration.as_millis() < 1000, "Execution took too long: {:?}", duration);
    assert_eq!(callback.delivered(), 1000);
}
