use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockforge_core::{StockError, StockResult, VendorId};

use crate::item::ItemId;

/// Lead time assumed when a link is created without one.
pub const DEFAULT_LEAD_TIME_DAYS: u32 = 7;

/// One item–vendor association: this vendor supplies this item at this price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorLink {
    pub item_id: ItemId,
    pub vendor_id: VendorId,
    /// Purchase price in the smallest currency unit (e.g., cents).
    pub price_minor: u64,
    pub lead_time_days: u32,
    pub primary: bool,
}

/// Item–vendor links, keyed by item.
///
/// Invariant: at most one link per item is flagged primary. `set_primary`
/// clears and sets under a single write lock, so observers never see zero or
/// two primaries mid-operation.
#[derive(Debug, Default)]
pub struct VendorDirectory {
    links: RwLock<HashMap<ItemId, Vec<VendorLink>>>,
}

impl VendorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a link, or update price/lead time of an existing one. The
    /// primary flag of an existing link is left untouched.
    pub fn upsert_link(
        &self,
        item_id: ItemId,
        vendor_id: VendorId,
        price_minor: u64,
        lead_time_days: Option<u32>,
    ) -> StockResult<VendorLink> {
        let mut links = self.write_links()?;
        let entry = links.entry(item_id).or_default();

        if let Some(link) = entry.iter_mut().find(|l| l.vendor_id == vendor_id) {
            link.price_minor = price_minor;
            if let Some(days) = lead_time_days {
                link.lead_time_days = days;
            }
            return Ok(link.clone());
        }

        let link = VendorLink {
            item_id,
            vendor_id,
            price_minor,
            lead_time_days: lead_time_days.unwrap_or(DEFAULT_LEAD_TIME_DAYS),
            primary: false,
        };
        entry.push(link.clone());
        Ok(link)
    }

    /// Remove a link. Removing the current primary leaves the item with no
    /// primary; callers must re-select explicitly.
    pub fn remove_link(&self, item_id: ItemId, vendor_id: VendorId) -> StockResult<()> {
        let mut links = self.write_links()?;
        let entry = links
            .get_mut(&item_id)
            .ok_or_else(|| StockError::not_found("vendor link"))?;
        let before = entry.len();
        entry.retain(|l| l.vendor_id != vendor_id);
        if entry.len() == before {
            return Err(StockError::not_found("vendor link"));
        }
        Ok(())
    }

    /// Make `vendor_id` the single primary vendor for the item, clearing any
    /// previous primary in the same logical operation.
    pub fn set_primary(&self, item_id: ItemId, vendor_id: VendorId) -> StockResult<VendorLink> {
        let mut links = self.write_links()?;
        let entry = links
            .get_mut(&item_id)
            .ok_or_else(|| StockError::not_found("vendor link"))?;

        if !entry.iter().any(|l| l.vendor_id == vendor_id) {
            return Err(StockError::not_found("vendor link"));
        }

        let mut chosen = None;
        for link in entry.iter_mut() {
            link.primary = link.vendor_id == vendor_id;
            if link.primary {
                chosen = Some(link.clone());
            }
        }
        // The membership check above guarantees a match.
        chosen.ok_or_else(|| StockError::invariant("primary vendor vanished during update"))
    }

    pub fn links_for(&self, item_id: ItemId) -> Vec<VendorLink> {
        let Ok(links) = self.links.read() else {
            return Vec::new();
        };
        links.get(&item_id).cloned().unwrap_or_default()
    }

    pub fn primary_for(&self, item_id: ItemId) -> Option<VendorLink> {
        self.links_for(item_id).into_iter().find(|l| l.primary)
    }

    /// The vendor the advisor should recommend: the primary link if set,
    /// else the cheapest link.
    pub fn recommended_for(&self, item_id: ItemId) -> Option<VendorLink> {
        let links = self.links_for(item_id);
        links
            .iter()
            .find(|l| l.primary)
            .cloned()
            .or_else(|| links.into_iter().min_by_key(|l| l.price_minor))
    }

    fn write_links(
        &self,
    ) -> StockResult<std::sync::RwLockWriteGuard<'_, HashMap<ItemId, Vec<VendorLink>>>> {
        self.links
            .write()
            .map_err(|_| StockError::invariant("vendor directory lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockforge_core::EntityId;

    fn test_item_id() -> ItemId {
        ItemId::new(EntityId::new())
    }

    fn primaries(dir: &VendorDirectory, item: ItemId) -> usize {
        dir.links_for(item).iter().filter(|l| l.primary).count()
    }

    #[test]
    fn upsert_creates_then_updates_without_touching_primary() {
        let dir = VendorDirectory::new();
        let item = test_item_id();
        let vendor = VendorId::new();

        let link = dir.upsert_link(item, vendor, 1200, None).unwrap();
        assert_eq!(link.lead_time_days, DEFAULT_LEAD_TIME_DAYS);
        assert!(!link.primary);

        dir.set_primary(item, vendor).unwrap();
        let updated = dir.upsert_link(item, vendor, 1100, Some(3)).unwrap();
        assert_eq!(updated.price_minor, 1100);
        assert_eq!(updated.lead_time_days, 3);
        assert!(updated.primary);
    }

    #[test]
    fn set_primary_always_leaves_exactly_one_primary() {
        let dir = VendorDirectory::new();
        let item = test_item_id();
        let a = VendorId::new();
        let b = VendorId::new();

        dir.upsert_link(item, a, 1000, None).unwrap();
        dir.upsert_link(item, b, 900, None).unwrap();

        dir.set_primary(item, a).unwrap();
        assert_eq!(primaries(&dir, item), 1);
        assert_eq!(dir.primary_for(item).unwrap().vendor_id, a);

        dir.set_primary(item, b).unwrap();
        assert_eq!(primaries(&dir, item), 1);
        assert_eq!(dir.primary_for(item).unwrap().vendor_id, b);
    }

    #[test]
    fn removing_the_primary_leaves_no_primary() {
        let dir = VendorDirectory::new();
        let item = test_item_id();
        let a = VendorId::new();
        let b = VendorId::new();

        dir.upsert_link(item, a, 1000, None).unwrap();
        dir.upsert_link(item, b, 900, None).unwrap();
        dir.set_primary(item, a).unwrap();

        dir.remove_link(item, a).unwrap();
        assert_eq!(primaries(&dir, item), 0);
        assert!(dir.primary_for(item).is_none());
    }

    #[test]
    fn recommended_falls_back_to_cheapest_link() {
        let dir = VendorDirectory::new();
        let item = test_item_id();
        let pricey = VendorId::new();
        let cheap = VendorId::new();

        dir.upsert_link(item, pricey, 1500, Some(2)).unwrap();
        dir.upsert_link(item, cheap, 800, Some(10)).unwrap();

        // No primary set: cheapest wins.
        assert_eq!(dir.recommended_for(item).unwrap().vendor_id, cheap);

        // Primary set: it wins regardless of price.
        dir.set_primary(item, pricey).unwrap();
        assert_eq!(dir.recommended_for(item).unwrap().vendor_id, pricey);
    }

    #[test]
    fn set_primary_on_unknown_link_is_not_found() {
        let dir = VendorDirectory::new();
        let item = test_item_id();
        dir.upsert_link(item, VendorId::new(), 1000, None).unwrap();

        let err = dir.set_primary(item, VendorId::new()).unwrap_err();
        assert_eq!(err, StockError::not_found("vendor link"));
    }
}
