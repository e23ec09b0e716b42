use gwinfer_core::derive_substream_seed;

/// Seed for the prior draw of one walker at one temperature.
pub fn init_seed(master_seed: u64, temp: usize, walker: usize) -> u64 {
    let intermediate = derive_substream_seed(master_seed ^ 0x1217_1217_1217_1217, temp as u64);
    derive_substream_seed(intermediate, walker as u64)
}

/// Seed for the stretch moves of one temperature during one iteration.
pub fn iteration_seed(master_seed: u64, temp: usize, iteration: usize) -> u64 {
    derive_substream_seed(master_seed, (temp as u64) << 40 | iteration as u64)
}

/// Seed for the temperature exchanges performed after one iteration.
pub fn exchange_seed(master_seed: u64, iteration: usize) -> u64 {
    derive_substream_seed(master_seed ^ 0xA5A5_A5A5_A5A5_A5A5, iteration as u64)
}
