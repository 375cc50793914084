// src/services/ordering.rs

//! Sibling ordering for course tabs and tab contents.
//!
//! Every sibling list keeps its `order` values as a contiguous `0..n`
//! sequence. Inserts make room, deletes close the gap, and moves shift the
//! items between the old and the new slot.

use uuid::Uuid;

/// An item that carries a position among its siblings.
pub trait Ordered {
    fn id(&self) -> Uuid;
    fn order(&self) -> i32;
    fn set_order(&mut self, order: i32);
}

impl<T: Ordered + ?Sized> Ordered for &mut T {
    fn id(&self) -> Uuid {
        (**self).id()
    }

    fn order(&self) -> i32 {
        (**self).order()
    }

    fn set_order(&mut self, order: i32) {
        (**self).set_order(order)
    }
}

fn len_as_order<T>(siblings: &[T]) -> i32 {
    i32::try_from(siblings.len()).unwrap_or(i32::MAX)
}

/// Makes room for a new sibling and returns the slot it should take.
///
/// `None`, or a slot past the end, appends. When another sibling already
/// holds the slot, every sibling at or after it moves up by one.
/// Gapped lists are re-packed first.
pub fn place<T: Ordered>(siblings: &mut [T], requested: Option<i32>) -> i32 {
    repack_if_gapped(siblings);
    let len = len_as_order(siblings);
    let slot = requested.map_or(len, |r| r.clamp(0, len));

    if siblings.iter().any(|s| s.order() == slot) {
        for sibling in siblings.iter_mut() {
            if sibling.order() >= slot {
                sibling.set_order(sibling.order() + 1);
            }
        }
    }

    slot
}

/// Closes the gap left by a removed sibling that held `removed_order`.
///
/// Lists that were already gapped before the removal are re-packed.
pub fn close_gap<T: Ordered>(siblings: &mut [T], removed_order: i32) {
    for sibling in siblings.iter_mut() {
        if sibling.order() > removed_order {
            sibling.set_order(sibling.order() - 1);
        }
    }

    repack_if_gapped(siblings);
}

fn repack_if_gapped<T: Ordered>(siblings: &mut [T]) {
    if !is_contiguous(siblings) {
        tracing::debug!("Sibling orders not contiguous, repacking");
        repack(siblings);
    }
}

/// Moves the sibling `id` to `new_order`, shifting the siblings in between.
///
/// Moving forward shifts the affected siblings down by one, moving backward
/// shifts them up by one. The target is clamped to the last slot.
/// Returns the final slot, or `None` if `id` is not among the siblings.
pub fn move_to<T: Ordered>(siblings: &mut [T], id: Uuid, new_order: i32) -> Option<i32> {
    if !siblings.iter().any(|s| s.id() == id) {
        return None;
    }
    repack_if_gapped(siblings);

    let old = siblings.iter().find(|s| s.id() == id)?.order();
    let last = (len_as_order(siblings) - 1).max(0);
    let target = new_order.clamp(0, last);

    for sibling in siblings.iter_mut().filter(|s| s.id() != id) {
        let order = sibling.order();
        if target > old && order > old && order <= target {
            sibling.set_order(order - 1);
        } else if target < old && order >= target && order < old {
            sibling.set_order(order + 1);
        }
    }

    if let Some(moving) = siblings.iter_mut().find(|s| s.id() == id) {
        moving.set_order(target);
    }

    Some(target)
}

/// Re-assigns `0..n` following the current order. Ties keep their
/// relative position. The slice itself ends up sorted by order.
pub fn repack<T: Ordered>(siblings: &mut [T]) {
    siblings.sort_by_key(|s| s.order());
    for (index, sibling) in siblings.iter_mut().enumerate() {
        sibling.set_order(i32::try_from(index).unwrap_or(i32::MAX));
    }
}

/// True when the orders are exactly `0..n` in some arrangement.
pub fn is_contiguous<T: Ordered>(siblings: &[T]) -> bool {
    let mut orders: Vec<i32> = siblings.iter().map(|s| s.order()).collect();
    orders.sort_unstable();
    orders
        .iter()
        .enumerate()
        .all(|(index, order)| i32::try_from(index).ok() == Some(*order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Item {
        id: Uuid,
        order: i32,
    }

    impl Ordered for Item {
        fn id(&self) -> Uuid {
            self.id
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn set_order(&mut self, order: i32) {
            self.order = order;
        }
    }

    fn items(orders: &[i32]) -> Vec<Item> {
        orders
            .iter()
            .map(|&order| Item {
                id: Uuid::new_v4(),
                order,
            })
            .collect()
    }

    fn orders(items: &[Item]) -> Vec<i32> {
        items.iter().map(|i| i.order).collect()
    }

    /// Inserts a new item the way the handlers do.
    fn insert(list: &mut Vec<Item>, requested: Option<i32>) -> Uuid {
        let slot = place(list, requested);
        let id = Uuid::new_v4();
        list.push(Item { id, order: slot });
        id
    }

    #[test]
    fn second_item_at_zero_pushes_first_to_one() {
        let mut list = Vec::new();
        let first = insert(&mut list, Some(0));
        let second = insert(&mut list, Some(0));

        let first = list.iter().find(|i| i.id == first).unwrap();
        let second = list.iter().find(|i| i.id == second).unwrap();
        assert_eq!(first.order, 1);
        assert_eq!(second.order, 0);
    }

    #[test]
    fn place_without_request_appends() {
        let mut list = items(&[0, 1, 2]);
        assert_eq!(place(&mut list, None), 3);
        assert_eq!(orders(&list), vec![0, 1, 2]);
    }

    #[test]
    fn place_past_end_is_clamped_to_append() {
        let mut list = items(&[0, 1]);
        assert_eq!(place(&mut list, Some(42)), 2);
        assert_eq!(orders(&list), vec![0, 1]);
    }

    #[test]
    fn place_in_middle_shifts_tail() {
        let mut list = items(&[0, 1, 2, 3]);
        assert_eq!(place(&mut list, Some(2)), 2);
        assert_eq!(orders(&list), vec![0, 1, 3, 4]);
    }

    #[test]
    fn append_to_gapped_list_repacks_first() {
        let mut list = items(&[0, 2]);
        assert_eq!(place(&mut list, None), 2);
        assert_eq!(orders(&list), vec![0, 1]);

        insert(&mut list, None);
        assert!(is_contiguous(&list), "orders: {:?}", orders(&list));
    }

    #[test]
    fn insert_into_gapped_list_converges() {
        let mut list = items(&[0, 3, 5]);
        assert_eq!(place(&mut list, Some(1)), 1);
        assert_eq!(orders(&list), vec![0, 2, 3]);

        list.push(Item {
            id: Uuid::new_v4(),
            order: 1,
        });
        assert!(is_contiguous(&list), "orders: {:?}", orders(&list));
    }

    #[test]
    fn move_in_gapped_list_converges() {
        let mut list = items(&[1, 4, 9]);
        let id = list[2].id;
        assert_eq!(move_to(&mut list, id, 0), Some(0));
        assert_eq!(orders(&list), vec![1, 2, 0]);
    }

    #[test]
    fn inserts_keep_sequence_contiguous() {
        let mut list = Vec::new();
        for requested in [Some(0), None, Some(1), Some(0), Some(10), Some(2)] {
            insert(&mut list, requested);
            assert!(is_contiguous(&list), "orders: {:?}", orders(&list));
        }
    }

    #[test]
    fn every_deletion_leaves_contiguous_orders() {
        for size in 1..=6 {
            for removed in 0..size {
                let mut list = items(&(0..size).collect::<Vec<_>>());
                let gone = list.remove(removed as usize);
                close_gap(&mut list, gone.order);
                assert!(
                    is_contiguous(&list),
                    "size {} removing {} gave {:?}",
                    size,
                    removed,
                    orders(&list)
                );
            }
        }
    }

    #[test]
    fn deletion_repairs_legacy_gaps() {
        let mut list = items(&[0, 3, 7, 8]);
        let gone = list.remove(1);
        close_gap(&mut list, gone.order);
        assert_eq!(orders(&list), vec![0, 1, 2]);
    }

    #[test]
    fn move_forward_shifts_between_down() {
        let mut list = items(&[0, 1, 2, 3]);
        let id = list[0].id;
        assert_eq!(move_to(&mut list, id, 2), Some(2));
        assert_eq!(orders(&list), vec![2, 0, 1, 3]);
    }

    #[test]
    fn move_backward_shifts_between_up() {
        let mut list = items(&[0, 1, 2, 3]);
        let id = list[3].id;
        assert_eq!(move_to(&mut list, id, 1), Some(1));
        assert_eq!(orders(&list), vec![0, 2, 3, 1]);
    }

    #[test]
    fn move_to_same_slot_is_noop() {
        let mut list = items(&[0, 1, 2]);
        let id = list[1].id;
        assert_eq!(move_to(&mut list, id, 1), Some(1));
        assert_eq!(orders(&list), vec![0, 1, 2]);
    }

    #[test]
    fn move_past_end_is_clamped() {
        let mut list = items(&[0, 1, 2]);
        let id = list[0].id;
        assert_eq!(move_to(&mut list, id, 99), Some(2));
        assert_eq!(orders(&list), vec![2, 0, 1]);
        assert!(is_contiguous(&list));
    }

    #[test]
    fn move_unknown_id_returns_none() {
        let mut list = items(&[0, 1]);
        assert_eq!(move_to(&mut list, Uuid::new_v4(), 0), None);
        assert_eq!(orders(&list), vec![0, 1]);
    }

    #[test]
    fn repack_sorts_and_renumbers_stably() {
        let mut list = items(&[5, 2, 2, 9]);
        let tie_first = list[1].id;
        repack(&mut list);
        assert_eq!(orders(&list), vec![0, 1, 2, 3]);
        assert_eq!(list[0].id, tie_first);
    }

    #[test]
    fn works_through_mutable_references() {
        let mut backing = items(&[0, 1, 2]);
        let mut refs: Vec<&mut Item> = backing.iter_mut().filter(|i| i.order > 0).collect();
        let slot = place(&mut refs, Some(1));
        assert_eq!(slot, 1);
        assert_eq!(orders(&backing), vec![0, 2, 3]);
    }
}
