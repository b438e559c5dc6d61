use bitflags::bitflags;

bitflags! {
    /// The 12 POSIX permission bits stored in a header's mode field
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Mode: u32 {
        const SETUID = 0o4000;
        const SETGID = 0o2000;
        const STICKY = 0o1000;

        const USER_READ = 0o400;
        const USER_WRITE = 0o200;
        const USER_EXEC = 0o100;

        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;

        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

impl Mode {
    /// The nine rwx bits, highest first, in `ls -l` order
    const RWX: [(Mode, char); 9] = [
        (Mode::USER_READ, 'r'),
        (Mode::USER_WRITE, 'w'),
        (Mode::USER_EXEC, 'x'),
        (Mode::GROUP_READ, 'r'),
        (Mode::GROUP_WRITE, 'w'),
        (Mode::GROUP_EXEC, 'x'),
        (Mode::OTHER_READ, 'r'),
        (Mode::OTHER_WRITE, 'w'),
        (Mode::OTHER_EXEC, 'x'),
    ];

    /// Permissions used for directories created implicitly on extract
    pub const IMPLICIT_DIR: Mode = Mode::from_bits_truncate(0o774);

    /// Render the nine rwx characters, `-` where a bit is absent
    pub fn rwx(&self) -> [char; 9] {
        let mut out = ['-'; 9];
        for (slot, (bit, c)) in out.iter_mut().zip(Self::RWX.iter()) {
            if self.contains(*bit) {
                *slot = *c;
            }
        }
        out
    }
}
