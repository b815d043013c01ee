use proptest::prelude::*;
use zmusic::relay::{relay, AudioFrameBlock};
use zmusic::rt::{process_safe, RenderCallback};

proptest! {
    #[test]
    fn rt_no_panic_fuzz(
        block_len in 0usize..512,
        quantum in 0usize..512,
        channels in 0usize..6,
        publish in any::<bool>(),
        value in -1.0f32..1.0,
    ) {
        let (mut publisher, consumer) = relay();
        let mut callback = RenderCallback::new(consumer);
        let mut outputs = vec![vec![9.0; quantum]; channels];

        if publish {
            publisher.publish(AudioFrameBlock::mono(vec![value; block_len]));
        }
        prop_assert!(process_safe(&mut callback, &mut outputs));

        let copied = if publish { block_len.min(quantum) } else { 0 };
        for (index, channel) in outputs.iter().enumerate() {
            prop_assert_eq!(channel.len(), quantum);
            for (i, &sample) in channel.iter().enumerate() {
                let expected = if index < 2 && i < copied { value } else { 0.0 };
                prop_assert_eq!(sample, expected);
            }
        }
    }
}
