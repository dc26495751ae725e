//! End-to-end message handling over an in-memory store and the native VM.

use std::sync::Arc;
use crate::keeper::{BankerKind, KeeperError, Msg, MsgAddPackage, MsgCall, MsgRun, VmKeeper, run_pkg_path};
use crate::state::Bank;
use crate::storage::{FsKvStore, MemKvStore};
use crate::types::{Address, Coins, MemFile, MemMod};
use crate::utils::METRICS;
use crate::vm::{NativeVm, TypedValue, VmFault};

const PKG: &str = "gno.land/r/test";
const VER: &str = "v0.0.0";

fn coins(s: &str) -> Coins {
    s.parse().unwrap()
}

/// Keeper with `addr1` holding 10_000_000ugnot.
fn setup_test_env() -> (VmKeeper<NativeVm>, Address) {
    let keeper = VmKeeper::new(Arc::new(MemKvStore::new()), NativeVm::new());
    let addr = Address::from_preimage(b"addr1");
    keeper.bank().set_coins(&addr, &coins("10000000ugnot")).unwrap();
    (keeper, addr)
}

fn add_test_pkg(keeper: &VmKeeper<NativeVm>, creator: Address, path: &str, body: &str) -> Result<(), KeeperError> {
    let msg = MsgAddPackage::new(creator, MemMod::new(path, VER), vec![MemFile::new("test.gno", body)]);
    keeper.add_package(&msg)
}

fn call(caller: Address, send: &str, func: &str, args: &[&str]) -> MsgCall {
    MsgCall::new(caller, coins(send), PKG, VER, func, args.iter().map(|a| a.to_string()).collect())
}

const ECHO_SRC: &str = r#"package test

import "std"

func init() {
}

func Echo(msg string) string {
	addr := std.GetOrigCaller()
	pkgAddr := std.GetOrigPkgAddr()
	send := std.GetOrigSend()
	banker := std.GetBanker(std.BankerTypeOrigSend)
	banker.SendCoins(pkgAddr, addr, send)
	return "echo:" + msg
}
"#;

/// Echo returns whatever was attached, through the origin-send banker.
fn bind_echo(vm: &NativeVm) {
    vm.bind(PKG, "Echo", |m, args| {
        let (caller, pkg, send) = (m.orig_caller(), m.orig_pkg_addr(), m.orig_send());
        m.banker(BankerKind::OrigSend).send_coins(&pkg, &caller, &send)?;
        Ok(vec![TypedValue::from(format!("echo:{}", args[0]))])
    });
}

/// Echo sends a fixed 10_000_000ugnot back with the given banker kind.
fn bind_fixed_send(vm: &NativeVm, kind: BankerKind) {
    vm.bind(PKG, "Echo", move |m, args| {
        let caller = m.orig_caller();
        let from = match kind {
            BankerKind::RealmSend => m.current_realm().map(|r| r.pkg_addr).unwrap_or_default(),
            _ => m.orig_pkg_addr(),
        };
        m.banker(kind).send_coins(&from, &caller, &coins("10000000ugnot"))?;
        Ok(vec![TypedValue::from(format!("echo:{}", args[0]))])
    });
}

#[test]
fn test_add_package_twice_is_invalid_pkg_path() {
    let (keeper, addr) = setup_test_env();
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();

    let err = add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap_err();
    assert!(matches!(err, KeeperError::InvalidPkgPath(_)), "got {:?}", err);

    let msg = Msg::AddPackage(MsgAddPackage::new(addr, MemMod::new(PKG, VER), vec![MemFile::new("test.gno", ECHO_SRC)]));
    let res = keeper.deliver(&msg).unwrap();
    assert_eq!(res.error.unwrap().code, "invalid_pkg_path");
}

#[test]
fn test_orig_send_returns_coins() {
    let (keeper, addr) = setup_test_env();
    bind_echo(keeper.vm());
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();

    // the whole balance is attached
    let res = keeper.call(&call(addr, "10000000ugnot", "Echo", &["hello world"])).unwrap();
    assert_eq!(res, r#"("echo:hello world" string)"#);
    assert_eq!(keeper.bank().get_coins(&addr).unwrap(), coins("10000000ugnot"));
    assert!(keeper.bank().get_coins(&Address::derive_pkg_addr(PKG)).unwrap().is_zero());
}

#[test]
fn test_orig_send_more_than_balance() {
    let (keeper, addr) = setup_test_env();
    bind_echo(keeper.vm());
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();

    let msg = call(addr, "11000000ugnot", "Echo", &["hello world"]);
    let err = keeper.call(&msg).unwrap_err();
    assert!(err.to_string().contains("insufficient coins error"), "got {}", err);

    let res = keeper.deliver(&Msg::Call(msg)).unwrap();
    assert_eq!(res.data, "");
    assert_eq!(res.error.unwrap().code, "insufficient_coins");
}

#[test]
fn test_orig_send_more_than_attached() {
    let (keeper, addr) = setup_test_env();
    bind_fixed_send(keeper.vm(), BankerKind::OrigSend);
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();

    let err = keeper.call(&call(addr, "9000000ugnot", "Echo", &["hello world"])).unwrap_err();
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("insufficient coins error"), "got {}", err);
    // the deposit is rolled back with the rest of the message
    assert_eq!(keeper.bank().get_coins(&addr).unwrap(), coins("10000000ugnot"));
    assert!(keeper.bank().get_coins(&Address::derive_pkg_addr(PKG)).unwrap().is_zero());
}

#[test]
fn test_realm_send_within_balance() {
    let (keeper, addr) = setup_test_env();
    keeper.vm().bind(PKG, "Echo", |m, args| {
        let (caller, send) = (m.orig_caller(), m.orig_send());
        let realm = m.current_realm().map(|r| r.pkg_addr).unwrap_or_default();
        m.banker(BankerKind::RealmSend).send_coins(&realm, &caller, &send)?;
        Ok(vec![TypedValue::from(format!("echo:{}", args[0]))])
    });
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();

    let res = keeper.call(&call(addr, "9000000ugnot", "Echo", &["hello world"])).unwrap();
    assert_eq!(res, r#"("echo:hello world" string)"#);
}

#[test]
fn test_realm_send_more_than_realm_balance() {
    let (keeper, addr) = setup_test_env();
    bind_fixed_send(keeper.vm(), BankerKind::RealmSend);
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();

    let err = keeper.call(&call(addr, "9000000ugnot", "Echo", &["hello world"])).unwrap_err();
    assert!(err.to_string().contains("insufficient coins error"), "got {}", err);
}

#[test]
fn test_realm_send_is_not_bounded_by_orig_send() {
    let (keeper, addr) = setup_test_env();
    bind_fixed_send(keeper.vm(), BankerKind::RealmSend);
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();
    keeper.bank().set_coins(&Address::derive_pkg_addr(PKG), &coins("50000000ugnot")).unwrap();

    keeper.call(&call(addr, "1000000ugnot", "Echo", &["x"])).unwrap();
    // 10M - 1M deposited + 10M from the realm
    assert_eq!(keeper.bank().get_coins(&addr).unwrap(), coins("19000000ugnot"));
    assert_eq!(keeper.bank().get_coins(&Address::derive_pkg_addr(PKG)).unwrap(), coins("41000000ugnot"));
}

#[test]
fn test_orig_caller_is_creator_during_init() {
    let (keeper, addr) = setup_test_env();
    let src = "package test\n\nvar admin std.Address\n\nfunc init() {\n\tadmin = std.GetOrigCaller()\n}\n\nfunc Main() string {\n\treturn admin.String()\n}\n";
    keeper.vm().bind(PKG, "init", |m, _| {
        let admin = m.orig_caller().to_string();
        m.set_state("admin", &admin)?;
        Ok(vec![])
    });
    keeper.vm().bind(PKG, "Main", |m, _| {
        let admin = m.get_state("admin")?.ok_or_else(|| VmFault::abort("admin unset"))?;
        Ok(vec![TypedValue::String(admin)])
    });
    add_test_pkg(&keeper, addr, PKG, src).unwrap();

    let addr2 = Address::from_preimage(b"addr2");
    let res = keeper.call(&call(addr2, "", "Main", &[])).unwrap();
    assert_eq!(res, format!("({:?} string)", addr.to_string()));
}

#[test]
fn test_run_hello_world() {
    let (keeper, addr) = setup_test_env();
    let path = run_pkg_path(&addr);
    keeper.vm().bind(&path, "main", |m, _| {
        m.println("hello world!");
        Ok(vec![])
    });
    let files = vec![MemFile::new("script.gno", "package main\n\nfunc main() {\n\tprintln(\"hello world!\")\n}\n")];
    let msg = MsgRun::new(addr, Coins::empty(), MemMod::new("", VER), files);

    assert_eq!(keeper.run(&msg).unwrap(), "hello world!\n");
    assert!(!keeper.package_store().has_package(&path, VER).unwrap());
}

#[test]
fn test_run_sees_caller_and_calls_stored_realm() {
    let (keeper, addr) = setup_test_env();
    bind_echo(keeper.vm());
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();

    let path = run_pkg_path(&addr);
    keeper.vm().bind(&path, "main", |m, _| {
        let caller = m.orig_caller();
        m.println(&caller.to_string());
        let out = m.call(PKG, VER, "Echo", &["from run".to_string()])?;
        m.println(&out[0].to_string());
        Ok(vec![])
    });
    let files = vec![MemFile::new("script.gno", "package main\n\nfunc main() {\n}\n")];
    let msg = MsgRun::new(addr, Coins::empty(), MemMod::new("", VER), files);

    let out = keeper.run(&msg).unwrap();
    assert_eq!(out, format!("{}\n(\"echo:from run\" string)\n", addr));
}

#[test]
fn test_run_requires_main_package() {
    let (keeper, addr) = setup_test_env();
    let files = vec![MemFile::new("script.gno", "package notmain\n\nfunc main() {\n}\n")];
    let err = keeper.run(&MsgRun::new(addr, Coins::empty(), MemMod::new("", VER), files)).unwrap_err();
    assert!(matches!(err, KeeperError::Validation(_)));
}

#[test]
fn test_wrong_arity_is_fatal() {
    let (keeper, addr) = setup_test_env();
    bind_echo(keeper.vm());
    add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();
    let before = METRICS.counter("keeper.fatal");

    let msg = Msg::Call(call(addr, "9000000ugnot", "Echo", &["hello", "world"]));
    let fault = keeper.deliver(&msg).unwrap_err();
    assert_eq!(fault.to_string(), "wrong number of arguments in call to Echo: want 1 got 2");
    assert!(METRICS.counter("keeper.fatal") > before);
    // nothing from the failed message is visible
    assert_eq!(keeper.bank().get_coins(&addr).unwrap(), coins("10000000ugnot"));
}

#[test]
fn test_nested_realms_share_orig_send_budget() {
    let (keeper, addr) = setup_test_env();
    const INNER: &str = "gno.land/r/inner";
    add_test_pkg(&keeper, addr, PKG, "package test\n\nfunc Pay() {\n}\n").unwrap();
    add_test_pkg(&keeper, addr, INNER, "package inner\n\nfunc Pay() {\n}\n\nfunc Who() string {\n}\n").unwrap();

    keeper.vm().bind(PKG, "Pay", |m, _| {
        let (caller, pkg) = (m.orig_caller(), m.orig_pkg_addr());
        m.banker(BankerKind::OrigSend).send_coins(&pkg, &caller, &coins("6000000ugnot"))?;
        m.call(INNER, VER, "Pay", &[])?;
        Ok(vec![])
    });
    keeper.vm().bind(INNER, "Pay", |m, _| {
        let (caller, pkg) = (m.orig_caller(), m.orig_pkg_addr());
        m.banker(BankerKind::OrigSend).send_coins(&pkg, &caller, &coins("5000000ugnot"))?;
        Ok(vec![])
    });

    let err = keeper.call(&MsgCall::new(addr, coins("10000000ugnot"), PKG, VER, "Pay", vec![])).unwrap_err();
    assert!(err.to_string().contains("orig send budget"), "got {}", err);
    assert_eq!(keeper.bank().get_coins(&addr).unwrap(), coins("10000000ugnot"));
}

#[test]
fn test_nested_call_sees_previous_realm() {
    let (keeper, addr) = setup_test_env();
    const INNER: &str = "gno.land/r/inner";
    add_test_pkg(&keeper, addr, PKG, "package test\n\nfunc Outer() string {\n}\n").unwrap();
    add_test_pkg(&keeper, addr, INNER, "package inner\n\nfunc Who() string {\n}\n").unwrap();

    keeper.vm().bind(PKG, "Outer", |m, _| m.call(INNER, VER, "Who", &[]));
    keeper.vm().bind(INNER, "Who", |m, _| {
        let prev = m.previous_realm().map(|r| r.pkg_path.clone()).unwrap_or_default();
        let cur = m.current_realm().map(|r| r.pkg_path.clone()).unwrap_or_default();
        Ok(vec![TypedValue::from(format!("{}<-{}", cur, prev))])
    });

    let res = keeper.call(&MsgCall::new(addr, Coins::empty(), PKG, VER, "Outer", vec![])).unwrap();
    assert_eq!(res, format!("({:?} string)", format!("{}<-{}", INNER, PKG)));
}

#[test]
fn test_versions_are_listed_in_order() {
    let (keeper, addr) = setup_test_env();
    for ver in ["v0.0.0", "v0.1.0"] {
        let msg = MsgAddPackage::new(addr, MemMod::new(PKG, ver), vec![MemFile::new("test.gno", "package test\n")]);
        keeper.add_package(&msg).unwrap();
    }
    let info = keeper.package_store().package_info(PKG).unwrap().unwrap();
    assert_eq!(info.name, "test");
    let versions: Vec<_> = info.versions.iter().map(|p| p.version().to_string()).collect();
    assert_eq!(versions, vec!["v0.0.0", "v0.1.0"]);
    assert!(info.validate().is_ok());
}

#[test]
fn test_nested_realm_state_is_isolated() {
    let (keeper, addr) = setup_test_env();
    const CHILD: &str = "gno.land/r/test/child";
    keeper.vm().bind(PKG, "init", |m, _| {
        m.set_state("child/admin", "alice")?;
        Ok(vec![])
    });
    keeper.vm().bind(PKG, "Admin", |m, _| {
        let admin = m.get_state("child/admin")?.unwrap_or_default();
        Ok(vec![TypedValue::String(admin)])
    });
    keeper.vm().bind(CHILD, "Take", |m, _| {
        m.set_state("admin", "mallory")?;
        Ok(vec![])
    });
    add_test_pkg(&keeper, addr, PKG, "package test\n\nfunc init() {\n}\n\nfunc Admin() string {\n}\n").unwrap();
    add_test_pkg(&keeper, addr, CHILD, "package child\n\nfunc Take() {\n}\n").unwrap();

    keeper.call(&MsgCall::new(addr, Coins::empty(), CHILD, VER, "Take", vec![])).unwrap();
    let res = keeper.call(&call(addr, "", "Admin", &[])).unwrap();
    assert_eq!(res, r#"("alice" string)"#);
}

#[test]
fn test_realm_state_delete() {
    let (keeper, addr) = setup_test_env();
    add_test_pkg(&keeper, addr, PKG, "package test\n\nfunc Set() {\n}\n\nfunc Clear() {\n}\n\nfunc Get() bool {\n}\n").unwrap();
    keeper.vm().bind(PKG, "Set", |m, _| {
        m.set_state("k", "v")?;
        Ok(vec![])
    });
    keeper.vm().bind(PKG, "Clear", |m, _| {
        m.delete_state("k")?;
        Ok(vec![])
    });
    keeper.vm().bind(PKG, "Get", |m, _| Ok(vec![TypedValue::Bool(m.get_state("k")?.is_some())]));

    keeper.call(&call(addr, "", "Set", &[])).unwrap();
    assert_eq!(keeper.call(&call(addr, "", "Get", &[])).unwrap(), "(true bool)");
    keeper.call(&call(addr, "", "Clear", &[])).unwrap();
    assert_eq!(keeper.call(&call(addr, "", "Get", &[])).unwrap(), "(false bool)");
}

#[test]
fn test_long_path_on_fs_store() {
    let dir = tempfile::tempdir().unwrap();
    let addr = Address::from_preimage(b"addr1");
    let keeper = VmKeeper::new(Arc::new(FsKvStore::open(dir.path()).unwrap()), NativeVm::new());
    let path = format!("gno.land/r/{}", "x".repeat(120));
    let msg = MsgAddPackage::new(addr, MemMod::new(&path, VER), vec![MemFile::new("test.gno", "package x\n")]);
    keeper.add_package(&msg).unwrap();
    assert!(keeper.package_store().has_package(&path, VER).unwrap());
    assert_eq!(keeper.package_store().list().unwrap().len(), 1);
}

#[test]
fn test_packages_survive_reopen_on_fs_store() {
    let dir = tempfile::tempdir().unwrap();
    let addr = Address::from_preimage(b"addr1");
    {
        let keeper = VmKeeper::new(Arc::new(FsKvStore::open(dir.path()).unwrap()), NativeVm::new());
        add_test_pkg(&keeper, addr, PKG, ECHO_SRC).unwrap();
    }
    let keeper = VmKeeper::new(Arc::new(FsKvStore::open(dir.path()).unwrap()), NativeVm::new());
    let pkg = keeper.package_store().get_package(PKG, VER, true).unwrap().unwrap();
    assert_eq!(pkg.name, "test");
    assert_eq!(pkg.get_file("test.gno").unwrap().body, ECHO_SRC);
}
