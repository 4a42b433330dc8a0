mod common;

use std::sync::Arc;

use nr_config::{CellParams, CfgErr, SchedArgs, SchedParams, UeCarrierCfg, UeCfg};
use nr_core::{Direction, DuplexConfig, debug};
use nr_sched::{HarqGrant, HarqState, PrbGrant, SchedErr, Ue, UeBufferManager};
use common::{TEST_RNTI, UeTest, default_test_params, default_test_params_with, default_test_ue_cfg, slot, tdd_dl7_ul3};

fn grant(tbs: u32) -> HarqGrant {
    HarqGrant { prbs: PrbGrant::new(0, 10), mcs: 10, tbs }
}

fn two_cell_params() -> Arc<SchedParams> {
    let cells = vec![CellParams::new(0, 52, tdd_dl7_ul3(), 4), CellParams::new(1, 106, DuplexConfig::Fdd, 4)];
    SchedParams::new(SchedArgs::default(), cells).unwrap()
}

fn ue_cfg_with_scell(scell_active: bool) -> UeCfg {
    let mut cfg = default_test_ue_cfg();
    cfg.carriers.push(UeCarrierCfg { cc: 1, active: scell_active });
    cfg
}

#[test]
fn test_commit_ack_cycle() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    assert_eq!(ticket.dir, Direction::Dl);
    assert_eq!((ticket.slot_tx, ticket.slot_ack), (slot(100), slot(104)));
    assert!(!ticket.retx);
    test.ue.commit_dl(&ticket, grant(1500)).unwrap();

    let h = test.ue.carrier(0).unwrap().harq_ent().dl_harq(ticket.pid).unwrap();
    assert_eq!(h.state(), HarqState::PendingNewTx);
    assert_eq!(h.tbs(), 1500);
    assert_eq!(h.harq_slot_ack(), slot(104));

    // Next reservation in the same slot sees the process busy
    let sfu = test.ue.try_reserve(slot(100), 0);
    assert_eq!(sfu.h_dl.map(|h| h.pid()), Some(1));

    assert_eq!(test.ue.dl_ack_info(0, ticket.pid, true), Ok(1500));
    let h = test.ue.carrier(0).unwrap().harq_ent().dl_harq(ticket.pid).unwrap();
    assert_eq!(h.state(), HarqState::Empty);
}

#[test]
fn test_retx_keeps_ndi_and_advances_rv() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    test.ue.commit_dl(&ticket, grant(1500)).unwrap();
    let ndi = test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap().ndi();
    assert_eq!(test.ue.dl_ack_info(0, 0, false), Ok(0));

    test.ue.new_slot(slot(101));
    let ticket = test.ue.try_reserve(slot(101), 0).dl_ticket().unwrap();
    assert_eq!(ticket.pid, 0);
    assert!(ticket.retx);
    test.ue.commit_dl(&ticket, grant(9999)).unwrap();

    let h = test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap();
    assert_eq!(h.nof_retx(), 1);
    assert_eq!(h.rv(), 2);
    assert_eq!(h.ndi(), ndi);
    assert_eq!(h.tbs(), 1500);
}

#[test]
fn test_process_dropped_after_max_retx() {
    debug::setup_logging_verbose();
    let args = SchedArgs { max_harq_retx: 2, ..Default::default() };
    let mut test = UeTest::new(default_test_params_with(args), default_test_ue_cfg());
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    test.ue.commit_dl(&ticket, grant(1500)).unwrap();
    assert_eq!(test.ue.dl_ack_info(0, 0, false), Ok(0));

    // Two retransmissions are granted, both NACKed
    for (n, pdcch) in [(1, 101), (2, 102)] {
        test.ue.new_slot(slot(pdcch));
        let ticket = test.ue.try_reserve(slot(pdcch), 0).dl_ticket().unwrap();
        assert_eq!((ticket.pid, ticket.retx), (0, true));
        test.ue.commit_dl(&ticket, grant(1500)).unwrap();
        assert_eq!(test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap().nof_retx(), n);
        assert_eq!(test.ue.dl_ack_info(0, 0, false), Ok(0));
        if n < 2 {
            let h = test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap();
            assert_eq!(h.state(), HarqState::PendingRetx);
        }
    }

    let h = test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap();
    assert_eq!(h.state(), HarqState::Empty);
    test.ue.new_slot(slot(103));
    let sfu = test.ue.try_reserve(slot(103), 0);
    assert!(!sfu.h_dl.unwrap().has_pending_retx());
}

#[test]
fn test_single_retx_budget() {
    debug::setup_logging_verbose();
    let args = SchedArgs { max_harq_retx: 1, ..Default::default() };
    let mut test = UeTest::new(default_test_params_with(args), default_test_ue_cfg());
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    test.ue.commit_dl(&ticket, grant(1500)).unwrap();
    assert_eq!(test.ue.dl_ack_info(0, 0, false), Ok(0));
    assert_eq!(test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap().state(), HarqState::PendingRetx);

    test.ue.new_slot(slot(101));
    let ticket = test.ue.try_reserve(slot(101), 0).dl_ticket().unwrap();
    assert!(ticket.retx);
    test.ue.commit_dl(&ticket, grant(1500)).unwrap();
    assert_eq!(test.ue.dl_ack_info(0, 0, false), Ok(0));
    assert_eq!(test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap().state(), HarqState::Empty);
}

#[test]
fn test_stale_ticket_refused_after_new_slot() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    test.ue.new_slot(slot(101));
    assert_eq!(
        test.ue.commit_dl(&ticket, grant(1500)),
        Err(SchedErr::StaleReservation { ticket: ticket.generation, current: ticket.generation.wrapping_add(1) })
    );
    assert_eq!(test.ue.carrier(0).unwrap().harq_ent().dl_harq(0).unwrap().state(), HarqState::Empty);
}

#[test]
fn test_stale_ticket_refused_after_set_cfg() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    test.ue.set_cfg(default_test_ue_cfg()).unwrap();
    assert!(matches!(test.ue.commit_dl(&ticket, grant(1500)), Err(SchedErr::StaleReservation { .. })));

    // A fresh reservation in the same slot is fine
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    assert_eq!(test.ue.commit_dl(&ticket, grant(1500)), Ok(()));
}

#[test]
fn test_commit_errors() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    assert_eq!(
        test.ue.commit_ul(&ticket, grant(1500)),
        Err(SchedErr::DirectionMismatch { expected: Direction::Ul, ticket: Direction::Dl })
    );
    let bad_prbs = HarqGrant { prbs: PrbGrant::new(40, 20), ..grant(1500) };
    assert_eq!(
        test.ue.commit_dl(&ticket, bad_prbs),
        Err(SchedErr::PrbOutOfRange { start: 40, len: 20, nof_prb: 52 })
    );
    test.ue.commit_dl(&ticket, grant(1500)).unwrap();
    assert_eq!(test.ue.commit_dl(&ticket, grant(1500)), Err(SchedErr::HarqBusy { dir: Direction::Dl, pid: 0 }));
    assert_eq!(test.ue.dl_ack_info(0, 16, true), Err(SchedErr::InvalidPid { dir: Direction::Dl, pid: 16 }));
    assert_eq!(test.ue.ul_crc_info(0, 0, true), Err(SchedErr::HarqEmpty { dir: Direction::Ul, pid: 0 }));
    assert_eq!(test.ue.dl_ack_info(2, 0, true), Err(SchedErr::InactiveCarrier(2)));
}

#[test]
fn test_ul_timeout_turns_into_retx() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_bsr(1000);

    test.ue.new_slot(slot(103));
    let ticket = test.ue.try_reserve(slot(103), 0).ul_ticket().unwrap();
    assert_eq!((ticket.slot_tx, ticket.slot_ack), (slot(107), slot(107)));
    test.ue.commit_ul(&ticket, grant(1000)).unwrap();

    // slot_rx 107: no CRC arrived for the PUSCH in 107
    test.ue.new_slot(slot(111));
    let h = test.ue.carrier(0).unwrap().harq_ent().ul_harq(0).unwrap();
    assert_eq!(h.state(), HarqState::PendingRetx);

    // pusch 115 is a DL slot, 117 is UL
    assert!(test.ue.try_reserve(slot(111), 0).h_ul.is_none());
    test.ue.new_slot(slot(113));
    let sfu = test.ue.try_reserve(slot(113), 0);
    assert_eq!(sfu.h_ul.map(|h| (h.pid(), h.has_pending_retx())), Some((0, true)));
}

#[test]
fn test_carrier_activation_lifecycle() {
    debug::setup_logging_verbose();
    let buffers = Arc::new(UeBufferManager::new());
    buffers.dl_buffer_state(4, 1000, 0);
    let mut ue = Ue::new(TEST_RNTI, ue_cfg_with_scell(false), two_cell_params(), buffers).unwrap();
    assert!(ue.carrier(1).is_none());
    assert!(!ue.has_ca());
    assert_eq!(ue.pcell_cc(), 0);

    ue.new_slot(slot(100));
    assert!(!ue.try_reserve(slot(100), 1).is_valid());
    assert!(!ue.try_reserve(slot(100), 7).is_valid());

    ue.set_cfg(ue_cfg_with_scell(true)).unwrap();
    assert!(ue.carrier(1).is_some());
    assert!(ue.has_ca());
    ue.new_slot(slot(101));
    let sfu = ue.try_reserve(slot(101), 1);
    assert!(sfu.is_valid());
    assert_eq!(sfu.cc, 1);
    let ticket = sfu.dl_ticket().unwrap();
    ue.commit_dl(&ticket, grant(500)).unwrap();

    // Deactivation keeps the carrier but skips it
    ue.set_cfg(ue_cfg_with_scell(false)).unwrap();
    assert!(ue.carrier(1).is_some());
    assert!(!ue.has_ca());
    ue.new_slot(slot(102));
    assert!(!ue.try_reserve(slot(102), 1).is_valid());
    assert!(ue.try_reserve(slot(102), 0).is_valid());

    // In-flight feedback on the deactivated carrier is still accepted
    assert_eq!(ue.dl_ack_info(1, ticket.pid, true), Ok(500));
    let ticket = ue.try_reserve(slot(102), 0).dl_ticket().unwrap();
    assert_eq!(ue.commit_dl(&ticket_on_cc(1, ticket), grant(500)), Err(SchedErr::InactiveCarrier(1)));
}

fn ticket_on_cc(cc: usize, ticket: nr_sched::HarqTicket) -> nr_sched::HarqTicket {
    nr_sched::HarqTicket { cc, ..ticket }
}

#[test]
fn test_cqi_reports() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.ue.dl_cqi_info(0, 9).unwrap();
    test.ue.ul_cqi_info(0, 31).unwrap();
    assert_eq!(test.ue.dl_cqi_info(3, 9), Err(SchedErr::InactiveCarrier(3)));

    test.ue.new_slot(slot(100));
    let sfu = test.ue.try_reserve(slot(100), 0);
    assert_eq!(sfu.dl_cqi, 9);
    assert_eq!(sfu.ul_cqi, 15);
}

#[test]
fn test_invalid_configurations() {
    debug::setup_logging_verbose();
    let buffers = Arc::new(UeBufferManager::new());
    let err = Ue::new(TEST_RNTI, UeCfg::new(0, vec![]), default_test_params(), buffers.clone()).unwrap_err();
    assert_eq!(err, CfgErr::EmptyK1Table);
    let err = Ue::new(TEST_RNTI, UeCfg::new(1, vec![4]), default_test_params(), buffers.clone()).unwrap_err();
    assert_eq!(err, CfgErr::UnknownCell(1));
    let mut cfg = default_test_ue_cfg();
    cfg.carriers[0].active = false;
    let err = Ue::new(TEST_RNTI, cfg, default_test_params(), buffers).unwrap_err();
    assert_eq!(err, CfgErr::NoActiveCarrier);

    // A rejected reconfiguration leaves the previous one in place
    let mut test = UeTest::with_defaults();
    let before = Arc::clone(test.ue.cfg());
    assert_eq!(test.ue.set_cfg(UeCfg::new(0, vec![16])), Err(CfgErr::InvalidK1(16)));
    assert!(Arc::ptr_eq(&before, test.ue.cfg()));
}

#[test]
fn test_all_carriers_deactivated() {
    debug::setup_logging_verbose();
    let mut test = UeTest::with_defaults();
    test.set_dl_buffer(3000);

    test.ue.new_slot(slot(100));
    let ticket = test.ue.try_reserve(slot(100), 0).dl_ticket().unwrap();
    test.ue.commit_dl(&ticket, grant(1500)).unwrap();

    let mut cfg = default_test_ue_cfg();
    cfg.carriers[0].active = false;
    test.ue.set_cfg(cfg.clone()).unwrap();
    test.ue.new_slot(slot(101));
    assert!(!test.ue.try_reserve(slot(101), 0).is_valid());
    assert_eq!(test.ue.dl_ack_info(0, ticket.pid, true), Ok(1500));

    cfg.carriers[0].active = true;
    test.ue.set_cfg(cfg).unwrap();
    assert!(test.ue.try_reserve(slot(101), 0).dl_ticket().is_some());
}
