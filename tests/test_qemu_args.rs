//! QEMU argument model through the public API.

use hostvm::config::VmSpec;
use hostvm::qemu::{build_vm_args, Arg, ArgAcceptedValue, ArgError, FlagArg, KeyValueArg, KeyValueArgItem};

#[test]
fn test_flag_arg() {
    let arg = FlagArg::new("nographic").unwrap();
    assert_eq!(arg.string_key(), "nographic");
    assert_eq!(arg.string_value(), "");
    assert_eq!(arg.value_type(), ArgAcceptedValue::None);
}

#[test]
fn test_flag_arg_rejects_unknown_key() {
    assert!(matches!(
        FlagArg::new("trace").unwrap_err().root(),
        ArgError::UnknownKey { .. }
    ));
}

#[test]
fn test_key_value_arg_renders_in_order() {
    let arg = KeyValueArg::new(
        "drive",
        &[
            KeyValueArgItem::new("if", "virtio"),
            KeyValueArgItem::new("file", "/dev/sdb"),
            KeyValueArgItem::new("format", "raw"),
        ],
    )
    .unwrap();

    assert_eq!(arg.string_key(), "drive");
    assert_eq!(arg.string_value(), "if=virtio,file=/dev/sdb,format=raw");
    assert_eq!(arg.string_value(), arg.string_value());
    assert_eq!(arg.value_type(), ArgAcceptedValue::KeyValue);
}

#[test]
fn test_key_value_arg_rejects_injection() {
    let err = KeyValueArg::new(
        "drive",
        &[KeyValueArgItem::new("file", "/tmp/a,readonly=off")],
    )
    .unwrap_err();

    assert!(err.to_string().contains("validate map value '/tmp/a,readonly=off'"));
    assert!(matches!(err.root(), ArgError::DisallowedChar { ch: ',', .. }));

    let err = KeyValueArg::new("drive", &[KeyValueArgItem::new("fi le", "x")]).unwrap_err();
    assert!(matches!(err.root(), ArgError::DisallowedChar { ch: ' ', .. }));
}

#[test]
fn test_key_value_arg_keeps_its_own_copy() {
    let mut items = vec![KeyValueArgItem::new("file", "/dev/sdb")];
    let arg = KeyValueArg::new("drive", &items).unwrap();

    items[0].value = "/dev/sdc".to_string();
    assert_eq!(arg.string_value(), "file=/dev/sdb");
}

#[test]
fn test_full_command_line_is_shell_safe() {
    let mut spec = VmSpec::new("/images/alpine.qcow2".into(), 2222);
    spec.disks.push("/dev/disk/by-id/usb-Ext4_Disk-0:0".into());
    let args = build_vm_args(&spec).unwrap();

    // Every value passed the allowlist, so the shell rendering needs no quoting.
    let rendered = args.to_string();
    assert!(!rendered.contains('\''));
    assert_eq!(shell_words::split(&rendered).unwrap(), args.to_argv());
    assert!(rendered.contains("-drive file=/dev/disk/by-id/usb-Ext4_Disk-0:0,format=raw,if=virtio"));
    assert!(rendered.contains("-no-reboot"));
}
