use std::{
    fs::{create_dir_all, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// 以追加方式写入单个日志文件，必要时创建父目录。
pub struct FileAppender
{
    path: PathBuf,
    file: BufWriter<File>,
}

impl FileAppender
{
    pub fn builder<T: AsRef<Path>>(path: T) -> FileAppenderBuilder
    {
        FileAppenderBuilder { path: path.as_ref().to_path_buf(),
                              capacity: 8 * 1024 }
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }
}

impl Write for FileAppender
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()>
    {
        self.file.flush()
    }
}

pub struct FileAppenderBuilder
{
    path: PathBuf,
    capacity: usize,
}

impl FileAppenderBuilder
{
    pub fn buffer_capacity(mut self, capacity: usize) -> Self
    {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> io::Result<FileAppender>
    {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(FileAppender { path: self.path,
                          file: BufWriter::with_capacity(self.capacity, file) })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn appends_to_existing_file()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("orderstat.log");

        let mut first = FileAppender::builder(&path).build().unwrap();
        first.write_all(b"first\n").unwrap();
        first.flush().unwrap();
        drop(first);

        let mut second = FileAppender::builder(&path).buffer_capacity(16).build().unwrap();
        second.write_all(b"second\n").unwrap();
        second.flush().unwrap();
        assert_eq!(second.path(), path.as_path());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
