#![no_main]

use cipherhunt::game::CipherState;
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::StdRng;

// First byte splits the input: the secret, then one step per byte.
fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (secret, steps) = rest.split_at(split);
    let secret = String::from_utf8_lossy(secret);

    let mut rng = StdRng::seed_from_u64(split as u64);
    let mut cipher = CipherState::new(&secret, '\u{2588}');
    let mut earned = 0;
    for &step in steps {
        let pct = u32::from(step & 0x7f);
        if step & 0x80 == 0 {
            cipher.reveal(pct, &mut rng);
        } else {
            cipher.conceal(pct, &mut rng);
        }
        assert!(cipher.decrypted_percentage() >= earned);
        assert!(cipher.visible_count() <= cipher.maskable_len());
        earned = cipher.decrypted_percentage();
    }
});
