// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! CRC64 with the reflected ISO polynomial, no initial or final inversion.
//!
//! Class ids recorded by the JaCoCo runtime are computed this way, so the
//! table and update step must stay bit-exact.

const POLY: u64 = 0xD800_0000_0000_0000;

const TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;

    while i < 256 {
        let mut value = i as u64;
        let mut bit = 0;

        while bit < 8 {
            value = if value & 1 == 1 {
                (value >> 1) ^ POLY
            } else {
                value >> 1
            };
            bit += 1;
        }

        table[i] = value;
        i += 1;
    }

    table
}

pub fn update(mut sum: u64, data: &[u8]) -> u64 {
    for byte in data {
        let index = ((sum ^ u64::from(*byte)) & 0xff) as usize;
        sum = (sum >> 8) ^ TABLE[index];
    }

    sum
}

pub fn checksum(data: &[u8]) -> u64 {
    update(0, data)
}
