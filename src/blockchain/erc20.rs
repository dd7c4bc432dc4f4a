// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 `Transfer` event decoding.

use alloy::primitives::{Address, FixedBytes, U256};
use alloy::sol;

use super::types::{ReceiptLog, TokenTransfer};

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: FixedBytes<32> = FixedBytes::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
]);

/// Decode a log as an ERC-20 transfer.
///
/// Returns `None` for any other event, including ERC-721 transfers (which
/// share the signature but carry the token id as a fourth topic).
pub fn decode_transfer(log: &ReceiptLog) -> Option<TokenTransfer> {
    // [event_sig, from, to] with the value in data
    if log.topics.len() != 3 || log.topics[0] != TRANSFER_TOPIC {
        return None;
    }
    if log.data.len() < 32 {
        return None;
    }

    // Addresses are the last 20 bytes of the 32-byte topics
    let from = Address::from_slice(&log.topics[1][12..]);
    let to = Address::from_slice(&log.topics[2][12..]);
    let amount = U256::from_be_slice(&log.data[..32]);

    Some(TokenTransfer {
        token: log.address,
        from,
        to,
        amount,
    })
}

#[cfg(test)]
pub(crate) fn transfer_log(token: Address, from: Address, to: Address, amount: U256) -> ReceiptLog {
    ReceiptLog {
        address: token,
        topics: vec![TRANSFER_TOPIC, from.into_word(), to.into_word()],
        data: amount.to_be_bytes::<32>().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, B256};
    use alloy::sol_types::SolEvent;

    #[test]
    fn transfer_topic_is_correct() {
        // keccak256("Transfer(address,address,uint256)")
        let expected = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
        assert_eq!(format!("{:#x}", TRANSFER_TOPIC), expected);
        assert_eq!(IERC20::Transfer::SIGNATURE_HASH, TRANSFER_TOPIC);
    }

    #[test]
    fn decodes_erc20_transfer() {
        let token = address!("55d398326f99059ff775485246999027b3197955");
        let from = address!("abc0000000000000000000000000000000000001");
        let to = address!("00000000000000000000000000000000000000ff");
        let log = transfer_log(token, from, to, U256::from(100u64));

        let transfer = decode_transfer(&log).unwrap();
        assert_eq!(transfer.token, token);
        assert_eq!(transfer.from, from);
        assert_eq!(transfer.to, to);
        assert_eq!(transfer.amount, U256::from(100u64));
    }

    #[test]
    fn ignores_other_events() {
        let token = address!("55d398326f99059ff775485246999027b3197955");
        let mut log = transfer_log(token, Address::ZERO, Address::ZERO, U256::from(1u64));
        log.topics[0] = B256::repeat_byte(0x11);
        assert!(decode_transfer(&log).is_none());

        // ERC-721 style: token id as an extra indexed topic, empty data
        let mut nft = transfer_log(token, Address::ZERO, Address::ZERO, U256::from(1u64));
        nft.topics.push(B256::repeat_byte(0x01));
        nft.data.clear();
        assert!(decode_transfer(&nft).is_none());
    }
}
