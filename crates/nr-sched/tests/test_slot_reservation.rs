mod common;

use std::sync::Arc;

use nr_core::{SlotPoint, debug};
use nr_sched::{HarqGrant, HarqState, PrbGrant, UeBufferManager};
use common::{UeTest, default_test_params, default_test_ue_cfg, slot, tdd_dl7_ul3};

fn grant(tbs: u32) -> HarqGrant {
    HarqGrant { prbs: PrbGrant::new(0, 10), mcs: 10, tbs }
}

/// Reserve on cc 0 and commit whatever DL process comes out. Returns its pid.
fn commit_dl_at(test: &mut UeTest, pdcch_slot: SlotPoint, tbs: u32) -> usize {
    test.ue.new_slot(pdcch_slot);
    let sfu = test.ue.try_reserve(pdcch_slot, 0);
    let ticket = sfu.dl_ticket().unwrap();
    test.ue.commit_dl(&ticket, grant(tbs)).unwrap();
    ticket.pid
}

#[test]
fn test_s1_dl_new_tx_in_dl_slot() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(2000);

    test.ue.new_slot(slot(100));
    assert_eq!(test.ue.dl_pending_bytes(), 2000);
    assert_eq!(test.ue.ul_pending_bytes(), 0);

    let sfu = test.ue.try_reserve(slot(100), 0);
    assert!(sfu.is_valid());
    assert_eq!(sfu.rnti, common::TEST_RNTI);
    assert_eq!(sfu.slot_rx, slot(96));
    assert_eq!(sfu.pdcch_slot, slot(100));
    assert_eq!(sfu.pdsch_slot, slot(100));
    assert_eq!(sfu.uci_slot, slot(104));
    assert_eq!(sfu.pusch_slot, slot(104));
    assert_eq!(sfu.dl_pending_bytes, 2000);

    let h_dl = sfu.h_dl.unwrap();
    assert_eq!(h_dl.pid(), 0);
    assert_eq!(h_dl.state(), HarqState::Empty);
    // pusch slot index 4 is DL only
    assert!(sfu.h_ul.is_none());
}

#[test]
fn test_s2_ul_suppressed_outside_ul_slots() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(2000);
    test.set_bsr(1500);

    test.ue.new_slot(slot(107));
    assert_eq!(test.ue.ul_pending_bytes(), 1500);

    let sfu = test.ue.try_reserve(slot(107), 0);
    assert_eq!(sfu.pusch_slot, slot(111));
    assert!(sfu.h_ul.is_none());
    // pdsch slot index 7 is UL, DL bytes wait as well
    assert!(sfu.h_dl.is_none());
    assert!(!sfu.has_candidate());
    assert!(sfu.is_valid());
}

#[test]
fn test_s3_ul_selection_is_pure() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_bsr(1500);

    test.ue.new_slot(slot(103));
    let sfu = test.ue.try_reserve(slot(103), 0);
    assert_eq!(sfu.pusch_slot, slot(107));
    assert_eq!(sfu.h_ul.map(|h| h.pid()), Some(0));
    let first_pid = sfu.h_ul.map(|h| h.pid());

    // Same slot again, nothing committed in between
    let again = test.ue.try_reserve(slot(103), 0).h_ul.map(|h| h.pid());
    assert_eq!(again, first_pid);

    test.ue.new_slot(slot(104));
    let sfu = test.ue.try_reserve(slot(104), 0);
    assert_eq!(sfu.pusch_slot, slot(108));
    assert_eq!(sfu.h_ul.map(|h| h.pid()), Some(0));
    assert_eq!(sfu.h_ul.map(|h| h.state()), Some(HarqState::Empty));
}

#[test]
fn test_s4_retx_beats_new_tx() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(1000);
    assert_eq!(commit_dl_at(&mut test, slot(100), 800), 0);
    assert_eq!(commit_dl_at(&mut test, slot(101), 800), 1);
    assert_eq!(commit_dl_at(&mut test, slot(102), 800), 2);

    assert_eq!(test.ue.dl_ack_info(0, 0, true), Ok(800));
    assert_eq!(test.ue.dl_ack_info(0, 1, true), Ok(800));
    assert_eq!(test.ue.dl_ack_info(0, 2, false), Ok(0));

    test.set_dl_buffer(5000);
    test.ue.new_slot(slot(103));
    let sfu = test.ue.try_reserve(slot(103), 0);
    let h_dl = sfu.h_dl.unwrap();
    assert_eq!(h_dl.pid(), 2);
    assert!(h_dl.has_pending_retx());
    assert!(sfu.dl_ticket().unwrap().retx);
}

#[test]
fn test_s5_sr_forces_minimum_grant() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.ue.ul_sr_info(slot(95));

    test.ue.new_slot(slot(96));
    assert_eq!(test.ue.ul_pending_bytes(), 512);
    assert_eq!(test.ue.last_sr_slot(), slot(95));
    // pusch slot 100 is DL
    assert!(test.ue.try_reserve(slot(96), 0).h_ul.is_none());

    test.ue.new_slot(slot(103));
    assert_eq!(test.ue.ul_pending_bytes(), 512);
    let sfu = test.ue.try_reserve(slot(103), 0);
    assert_eq!(sfu.pusch_slot, slot(107));
    assert_eq!(sfu.h_ul.map(|h| h.pid()), Some(0));
}

#[test]
fn test_s6_reconfiguration_rebuilds_bwp_view() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(1000);

    test.ue.new_slot(slot(100));
    let old_cfg = Arc::clone(test.ue.cfg());
    let sfu = test.ue.try_reserve(slot(100), 0);
    assert_eq!(sfu.uci_slot, slot(104));
    assert!(sfu.cfg.unwrap().is_built_from(&old_cfg));

    // Same content in a new configuration object still counts as a change
    test.ue.set_cfg(default_test_ue_cfg()).unwrap();
    let same_content = Arc::clone(test.ue.cfg());
    assert!(!Arc::ptr_eq(&old_cfg, &same_content));
    let sfu = test.ue.try_reserve(slot(100), 0);
    assert!(sfu.cfg.unwrap().is_built_from(&same_content));

    test.ue.set_cfg(nr_config::UeCfg::new(0, vec![8])).unwrap();
    let new_cfg = Arc::clone(test.ue.cfg());
    test.ue.new_slot(slot(101));
    let sfu = test.ue.try_reserve(slot(101), 0);
    assert!(sfu.cfg.unwrap().is_built_from(&new_cfg));
    assert_eq!(sfu.uci_slot, slot(109));
}

#[test]
fn test_slot_invariants_over_many_slots() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(100_000);
    test.set_bsr(100_000);
    let duplex = tdd_dl7_ul3();
    let k1_table = [4, 5, 6, 7];

    for count in 100..200 {
        let pdcch_slot = slot(count);
        test.ue.new_slot(pdcch_slot);
        let sfu = test.ue.try_reserve(pdcch_slot, 0);
        let harq_ent = sfu.harq_ent.unwrap();

        if sfu.h_dl.is_some() {
            assert!(duplex.is_dl(sfu.pdsch_slot.slot_idx()), "DL candidate in slot {}", sfu.pdsch_slot);
        }
        if sfu.h_ul.is_some() {
            assert!(duplex.is_ul(sfu.pusch_slot.slot_idx()), "UL candidate in slot {}", sfu.pusch_slot);
        }
        if duplex.is_dl(sfu.pdsch_slot.slot_idx()) && harq_ent.find_pending_dl_retx().is_some() {
            assert!(sfu.h_dl.unwrap().has_pending_retx(), "new tx chosen over retx in slot {}", pdcch_slot);
        }
        let k1 = k1_table[sfu.pdsch_slot.slot_idx() as usize % k1_table.len()];
        assert_eq!(sfu.uci_slot, sfu.pdsch_slot + k1);
        assert_eq!(sfu.pusch_slot, pdcch_slot + 4);

        // No feedback ever arrives: processes time out, get retransmitted and are finally dropped
        let (dl_ticket, ul_ticket) = (sfu.dl_ticket(), sfu.ul_ticket());
        if let Some(ticket) = dl_ticket {
            test.ue.commit_dl(&ticket, grant(1000)).unwrap();
        }
        if let Some(ticket) = ul_ticket {
            test.ue.commit_ul(&ticket, grant(1000)).unwrap();
        }
    }
}

#[test]
fn test_no_candidate_without_data() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.ue.new_slot(slot(103));
    let sfu = test.ue.try_reserve(slot(103), 0);
    assert!(sfu.is_valid());
    assert!(sfu.h_dl.is_none());
    assert!(sfu.h_ul.is_none());
}

#[test]
fn test_fdd_allows_both_directions() {
    debug::setup_logging_verbose();
    let params = nr_config::SchedParams::new(
        nr_config::SchedArgs::default(),
        vec![nr_config::CellParams::new(0, 52, nr_core::DuplexConfig::Fdd, 4)],
    )
    .unwrap();
    let mut test = UeTest::new(params, default_test_ue_cfg());
    test.set_dl_buffer(100);
    test.set_bsr(100);
    for count in 100..110 {
        test.ue.new_slot(slot(count));
        let sfu = test.ue.try_reserve(slot(count), 0);
        assert!(sfu.h_dl.is_some());
        assert!(sfu.h_ul.is_some());
    }
}

#[test]
fn test_buffers_shared_with_other_thread() {
    debug::setup_logging_verbose();
    let buffers = Arc::new(UeBufferManager::new());
    let mut ue = nr_sched::Ue::new(common::TEST_RNTI, default_test_ue_cfg(), default_test_params(), buffers.clone()).unwrap();

    let writer = Arc::clone(&buffers);
    std::thread::spawn(move || writer.dl_buffer_state(3, 4000, 100)).join().unwrap();
    ue.new_slot(slot(100));
    assert_eq!(ue.dl_pending_bytes(), 4100);
}
