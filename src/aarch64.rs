#[cfg(all(target_os = "android"))]
pub(crate) const PTRACE_GETREGSET: i32 = 0x4204;

#[cfg(all(not(target_os = "android")))]
pub(crate) const PTRACE_GETREGSET: u32 = 0x4204;

/// General-purpose register set, defined in `include/uapi/linux/elf.h`.
pub(crate) const NT_PRSTATUS: i32 = 0x1;

/// Defined in [`arch/arm64/include/uapi/asm/ptrace.h`](https://android.googlesource.com/kernel/common/+/refs/heads/android-mainline/arch/arm64/include/uapi/asm/ptrace.h#88).
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct user_pt_regs {
    pub regs: [u64; 31],
    pub sp: u64,
    pub pc: u64,
    pub pstate: u64
}
