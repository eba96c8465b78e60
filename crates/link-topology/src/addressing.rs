//! Link address plan
//!
//! Ground station `i` owns `1.(i/256).(i%256).1/24`; the satellite serving it
//! takes the next host address in that subnet. Inter-satellite links draw
//! `/24` subnets starting at `2.0.1.0`, hosts `.1` and `.2`, and hand released
//! pairs back through a FIFO reuse queue.

use crate::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

/// Usable third-octet values per second-octet block (1..=253)
const SUBNETS_PER_BLOCK: u32 = 253;
const LAST_UNICAST_OCTET: u32 = 223;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddressPair {
    pub a: Ipv4Addr,
    pub b: Ipv4Addr,
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

pub fn ground_station_address(index: usize) -> Result<Ipv4Addr> {
    if index > 0xFFFF {
        return Err(TopologyError::AddressSpaceExhausted);
    }
    Ok(Ipv4Addr::new(1, (index >> 8) as u8, (index & 0xFF) as u8, 1))
}

/// Address handed to a satellite linked to the station owning `station`
pub fn satellite_address_for(station: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, d] = station.octets();
    Ipv4Addr::new(a, b, c, d.wrapping_add(1))
}

#[derive(Debug, Clone, Default)]
pub struct AddressAllocator {
    reuse: VecDeque<AddressPair>,
    next_subnet: u32,
    in_use: BTreeSet<AddressPair>,
}

impl AddressAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> Result<AddressPair> {
        let c = self.next_subnet;
        let first = 2 + c / (SUBNETS_PER_BLOCK * 256);
        if first > LAST_UNICAST_OCTET {
            return Err(TopologyError::AddressSpaceExhausted);
        }
        let second = (c / SUBNETS_PER_BLOCK) % 256;
        let third = 1 + c % SUBNETS_PER_BLOCK;
        self.next_subnet += 1;

        let (first, second, third) = (first as u8, second as u8, third as u8);
        Ok(AddressPair {
            a: Ipv4Addr::new(first, second, third, 1),
            b: Ipv4Addr::new(first, second, third, 2),
        })
    }

    /// Reuse queue first, otherwise a fresh subnet
    pub fn allocate_pair(&mut self) -> Result<AddressPair> {
        let pair = match self.reuse.pop_front() {
            Some(pair) => pair,
            None => self.mint()?,
        };
        self.in_use.insert(pair);
        debug!("Allocated link subnet {}", pair);
        Ok(pair)
    }

    pub fn release_pair(&mut self, pair: AddressPair) -> Result<()> {
        if !self.in_use.remove(&pair) {
            return Err(TopologyError::UnknownAddressPair(pair));
        }
        self.reuse.push_back(pair);
        Ok(())
    }

    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }

    pub fn reusable(&self) -> usize {
        self.reuse.len()
    }

    pub fn subnets_minted(&self) -> u32 {
        self.next_subnet
    }
}
