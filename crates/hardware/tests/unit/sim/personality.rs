//! Personality and NID table tests.

use pspsim_core::common::ByteOrder;
use pspsim_core::common::constants::{REG_A0, REG_A1, REG_A2, REG_GP};
use pspsim_core::sim::{LoadedImage, Native, NidResolver, NidTable, Personality, PspExecWrapper};

#[test]
fn test_native_leaves_image_alone() {
    let mut image = LoadedImage::new(0x0880_4000, ByteOrder::Little);
    image.set_reg(REG_GP, 0x0881_0000);
    let before = image.clone();
    Native.finish(&mut image);
    assert_eq!(image, before);
    assert_eq!(Native.name(), "native");
}

#[test]
fn test_exec_wrapper_sets_arguments() {
    let mut image = LoadedImage::new(0x0880_4000, ByteOrder::Little);
    let wrapper = PspExecWrapper::default();
    wrapper.finish(&mut image);
    assert_eq!(image.entry_point, 0x0880_4000);
    assert_eq!(image.reg(REG_A0), Some(1));
    assert_eq!(image.reg(REG_A1), Some(0x0880_4000));
    assert_eq!(image.reg(REG_A2), Some(0));
    assert_eq!(wrapper.name(), "psp-exec");
}

#[test]
fn test_exec_wrapper_override() {
    let mut image = LoadedImage::new(0x0880_4000, ByteOrder::Little);
    PspExecWrapper {
        entry_override: Some(0x0880_0000),
    }
    .finish(&mut image);
    assert_eq!(image.entry_point, 0x0880_0000);
    assert_eq!(image.reg(REG_A1), Some(0x0880_4000));
}

#[test]
fn test_set_reg_replaces_existing_preset() {
    let mut image = LoadedImage::new(0, ByteOrder::Big);
    image.set_reg(REG_A0, 5);
    image.set_reg(REG_A0, 6);
    assert_eq!(image.initial_regs, vec![(REG_A0, 6)]);
    assert_eq!(image.reg(REG_A1), None);
}

#[test]
fn test_nid_table_lookup_and_names() {
    let mut table = NidTable::new();
    assert!(table.is_empty());
    table.insert(0x1111_1111, 1);
    table.insert_named(0x2222_2222, 2, "sceDisplaySetMode");
    table.insert(0x1111_1111, 3);

    assert_eq!(table.len(), 2);
    assert_eq!(table.syscall_for_nid(0x1111_1111), Some(3));
    assert_eq!(table.syscall_for_nid(0x3333_3333), None);
    assert_eq!(table.nid_name(0x2222_2222), Some("sceDisplaySetMode"));
    assert_eq!(table.nid_name(0x1111_1111), None);
}

#[test]
fn test_nid_resolver_default_name() {
    struct Fixed;
    impl NidResolver for Fixed {
        fn syscall_for_nid(&self, _nid: u32) -> Option<u32> {
            Some(9)
        }
    }
    assert_eq!(Fixed.syscall_for_nid(0), Some(9));
    assert_eq!(Fixed.nid_name(0), None);
}
